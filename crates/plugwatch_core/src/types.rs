//! Tipos de telemetria da tomada e eventos de alerta.
//!
//! Uma leitura (`PowerSample`) chega em uma de duas formas, dependendo da
//! revisão de hardware do plugue: `power` (watts, hw v1) ou `power_mw`
//! (miliwatts, hw v2). O resto do payload do medidor (tensão, corrente,
//! totais, err_code) é ignorado na deserialização.

use serde::{Deserialize, Serialize};

/// Erros de normalização de uma amostra.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SampleError {
    #[error("amostra sem campo de potência (esperado `power` ou `power_mw`)")]
    MissingPower,

    #[error("potência negativa na amostra: {0} W")]
    NegativePower(f64),
}

/// Uma leitura instantânea de potência reportada pela tomada.
///
/// Exatamente um dos dois campos é esperado; se ambos vierem, `power`
/// (watts) tem precedência.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct PowerSample {
    /// Potência em watts (hardware v1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    /// Potência em miliwatts (hardware v2)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_mw: Option<f64>,
}

impl PowerSample {
    /// Amostra em watts.
    pub fn from_watts(w: f64) -> Self {
        Self {
            power: Some(w),
            power_mw: None,
        }
    }

    /// Amostra em miliwatts.
    pub fn from_milliwatts(mw: f64) -> Self {
        Self {
            power: None,
            power_mw: Some(mw),
        }
    }

    /// Normaliza a leitura para watts.
    ///
    /// Regra: `power` direto se presente; senão `power_mw / 1000`; senão a
    /// amostra é malformada. Valores negativos são rejeitados.
    pub fn watts(&self) -> Result<f64, SampleError> {
        let w = match (self.power, self.power_mw) {
            (Some(w), _) => w,
            (None, Some(mw)) => mw / 1000.0,
            (None, None) => return Err(SampleError::MissingPower),
        };
        if w < 0.0 {
            return Err(SampleError::NegativePower(w));
        }
        Ok(w)
    }
}

/// Classe de um evento de alerta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    /// Transição parado → em funcionamento
    Started,
    /// Transição em funcionamento → parado
    Stopped,
    /// Inatividade excessiva
    Idle,
    /// Tempo de funcionamento excessivo
    Running,
}

/// Um evento emitido pelo engine, pronto para log e notificação.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub message: String,
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watts_direct_field() {
        assert_eq!(PowerSample::from_watts(42.5).watts(), Ok(42.5));
    }

    #[test]
    fn milliwatts_are_normalized() {
        // {power_mw: 1500} deve ser lido como 1.5 W
        assert_eq!(PowerSample::from_milliwatts(1500.0).watts(), Ok(1.5));
    }

    #[test]
    fn watts_take_precedence_when_both_present() {
        let s = PowerSample {
            power: Some(2.0),
            power_mw: Some(9_000.0),
        };
        assert_eq!(s.watts(), Ok(2.0));
    }

    #[test]
    fn empty_sample_is_malformed() {
        assert_eq!(PowerSample::default().watts(), Err(SampleError::MissingPower));
    }

    #[test]
    fn negative_power_is_rejected() {
        assert_eq!(
            PowerSample::from_watts(-1.0).watts(),
            Err(SampleError::NegativePower(-1.0))
        );
    }

    #[test]
    fn deserializes_both_hardware_shapes() {
        // hw v1: watts + campos extras do emeter que devem ser ignorados
        let v1: PowerSample =
            serde_json::from_str(r#"{"voltage":229.8,"current":0.21,"power":47.3,"err_code":0}"#)
                .unwrap();
        assert_eq!(v1.watts(), Ok(47.3));

        // hw v2: miliwatts
        let v2: PowerSample =
            serde_json::from_str(r#"{"voltage_mv":230100,"power_mw":1500,"err_code":0}"#).unwrap();
        assert_eq!(v2.watts(), Ok(1.5));
    }
}
