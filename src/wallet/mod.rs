// Wallets, addresses and signing

pub mod address;
mod keystore;

pub use keystore::{Wallet, Wallets};
