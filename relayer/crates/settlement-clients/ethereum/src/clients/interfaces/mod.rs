pub mod balance_verifier;
