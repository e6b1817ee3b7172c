//! # PlugWatch Core
//!
//! Crate com a lógica central do PlugWatch: inferência de estado do
//! dispositivo monitorado a partir de leituras de potência, regras de
//! alerta com repetição limitada e configuração TOML.
//!
//! ## Módulos
//! - [`types`] – `PowerSample` (watts/miliwatts), normalização e eventos
//! - [`engine`] – `DeviceState` + `DeviceMonitor::observe`
//! - [`schedule`] – política pura "dispara e repete com cadência"
//! - [`config`] – Configuração unificada via TOML

pub mod config;
pub mod engine;
pub mod schedule;
pub mod types;

// Re-exports convenientes
pub use config::{AlertRules, AppConfig, DeviceConfig};
pub use engine::{DeviceMonitor, DeviceState};
pub use types::{AlertEvent, AlertKind, PowerSample, SampleError};
