//! End-to-end runs of the DCA loop against an in-memory exchange.

mod dca_run;
mod mock_exchange;
