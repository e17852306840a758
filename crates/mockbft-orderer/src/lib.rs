//! An in-memory mock orderer: a drop-in stand-in for a BFT consensus engine,
//! built to drive application state machines at very high block rates for
//! simulation and benchmarking.
//!
//! The kernel is deliberately not fault tolerant, not networked between
//! validators, and not persistent. What it does guarantee is the execution
//! contract applications see: a deterministic per-height round (propose,
//! prevote, precommit, commit), in-order transaction delivery, a
//! reproducible app hash, and a JSON-RPC surface that looks like the engine
//! it replaces.
//!
//! Hosts embed the kernel through [`Builder`]: they supply a [`Config`], an
//! [`Application`] (or the default [`KvApplication`]), a validator set, and a
//! proposer strategy, then call [`Orderer::run_until_stopped`].

pub mod app;
pub mod config;
pub mod consensus;
mod driver;
pub mod engine;
pub mod mempool;
mod orderer;
pub mod processor;
mod rpc;
pub mod state_store;

pub use crate::{
    app::{
        AppHash,
        Application,
        CheckTxError,
        DeliverTxError,
        KvApplication,
        TxResult,
    },
    config::Config,
    consensus::{
        ConsensusError,
        ConsensusState,
        PrecommitOutcome,
        ProposerSelector,
        RoundRobin,
    },
    engine::{
        BlockExecution,
        BlockProductionError,
        Engine,
    },
    mempool::{
        Mempool,
        MempoolError,
    },
    orderer::{
        Builder,
        Orderer,
    },
    processor::{
        KvProcessor,
        Processor,
        ProcessorError,
        ProcessorRegistry,
        RouteError,
    },
    state_store::StateStore,
};
