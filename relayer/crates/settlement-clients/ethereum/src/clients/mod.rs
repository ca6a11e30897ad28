pub mod interfaces;

pub use interfaces::balance_verifier::BalanceVerifier;
