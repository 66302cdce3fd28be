// Data processing pipeline for catalog reconciliation

pub mod processing;
