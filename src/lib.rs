//! # specfit
//!
//! Offline analysis of optical spectroscopy and transient-decay
//! measurements: parse delimited instrument files, group them by filename
//! keys, compute optical densities, find peaks and fit line shapes or decay
//! curves with parameter uncertainties.
//!
//! The usual entry point is [`pipeline::SpectralAnalysis`] driven by a
//! [`config::AnalysisConfig`]; every component is also usable on its own.
pub mod assembler;
pub mod binning;
pub mod config;
pub mod constants;
pub mod discovery;
pub mod export;
pub mod fitting;
pub mod fourier;
pub mod jagged;
pub mod natural_sort;
pub mod optical_density;
pub mod peaks;
pub mod pipeline;
pub mod record;
pub mod router;
pub mod signal;
pub mod smoothing;
pub mod specfit_errors;
pub mod units;
