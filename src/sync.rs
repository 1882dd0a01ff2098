//! Background mirrors from the KV store into the relational store: the
//! 10 s high-bid reconciler and the bid-stream tailer.

pub mod auctions;
pub mod bids;
