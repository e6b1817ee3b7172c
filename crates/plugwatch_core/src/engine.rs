//! Engine de estado do dispositivo monitorado.
//!
//! Converte o fluxo ruidoso de leituras de potência em transições
//! ligado/desligado com debounce por limiar, e avalia as duas regras de
//! tempo (inatividade e funcionamento excessivo) a cada amostra observada.
//!
//! O tempo entra sempre como parâmetro (`now`, segundos epoch), nunca é
//! lido de relógio aqui dentro: `observe` é função de (now, estado,
//! amostra) e os testes de timing rodam sem esperar.

use crate::config::AlertRules;
use crate::schedule::should_fire;
use crate::types::{AlertEvent, AlertKind, PowerSample, SampleError};
use serde::Serialize;
use tracing::debug;

/// Estado inferido do dispositivo. Instância única, construída no startup
/// e mutada exclusivamente por [`DeviceMonitor::observe`]. Sem persistência:
/// reinício do processo zera tudo.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceState {
    /// Estado operacional inferido
    pub running: bool,
    /// Momento da última transição para ligado
    pub last_started_at: f64,
    /// Momento da última transição para desligado (âncora da regra de inatividade)
    pub last_stopped_at: f64,
    /// Último disparo do alerta de inatividade
    pub last_idle_alert_at: f64,
    /// Já houve alerta de inatividade desde a última parada?
    pub idle_alert_armed: bool,
    /// Último disparo do alerta de funcionamento excessivo
    pub last_run_alert_at: f64,
    /// Já houve alerta de funcionamento desde o último início?
    pub run_alert_armed: bool,
    /// Leitura bruta mais recente aceita
    pub last_sample: Option<PowerSample>,
}

impl DeviceState {
    /// Estado inicial: desligado, todos os timestamps em `now`.
    pub fn new(now: f64) -> Self {
        Self {
            running: false,
            last_started_at: now,
            last_stopped_at: now,
            last_idle_alert_at: now,
            idle_alert_armed: false,
            last_run_alert_at: now,
            run_alert_armed: false,
            last_sample: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_stopped(&self) -> bool {
        !self.running
    }
}

/// Engine: estado do dispositivo + parâmetros das regras.
#[derive(Debug)]
pub struct DeviceMonitor {
    alias: String,
    power_threshold: f64,
    rules: AlertRules,
    state: DeviceState,
}

impl DeviceMonitor {
    pub fn new(
        alias: impl Into<String>,
        power_threshold: f64,
        rules: AlertRules,
        now: f64,
    ) -> Self {
        Self {
            alias: alias.into(),
            power_threshold,
            rules,
            state: DeviceState::new(now),
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Processa uma amostra e devolve os eventos gerados (0 ou mais).
    ///
    /// As três regras rodam em ordem fixa: transição, inatividade,
    /// funcionamento. Uma transição na primeira etapa já é visível para as
    /// duas seguintes dentro da mesma observação.
    ///
    /// Amostra malformada devolve `Err` sem mutar nada — fail-soft, quem
    /// chama loga e segue.
    pub fn observe(
        &mut self,
        sample: &PowerSample,
        now: f64,
    ) -> Result<Vec<AlertEvent>, SampleError> {
        let watts = sample.watts()?;
        self.state.last_sample = Some(*sample);
        debug!(watts, running = self.state.running, "amostra observada");

        let mut events = Vec::new();
        self.check_transition(watts, now, &mut events);
        self.check_idle(now, &mut events);
        self.check_running(now, &mut events);
        Ok(events)
    }

    /// Regra (a): detecção de início/parada.
    ///
    /// Ambas as direções comparam o valor normalizado em watts contra o
    /// limiar (início estritamente acima, parada em/abaixo).
    fn check_transition(&mut self, watts: f64, now: f64, events: &mut Vec<AlertEvent>) {
        if watts > self.power_threshold {
            if self.state.is_stopped() {
                self.state.running = true;
                self.state.last_started_at = now;
                // Transição desarma os dois alertas
                self.state.run_alert_armed = false;
                self.state.idle_alert_armed = false;
                events.push(AlertEvent {
                    kind: AlertKind::Started,
                    message: format!("{} Started ({watts:.1} W)", self.alias),
                });
            }
        } else if self.state.is_running() {
            self.state.running = false;
            self.state.last_stopped_at = now;
            self.state.idle_alert_armed = false;
            self.state.run_alert_armed = false;
            events.push(AlertEvent {
                kind: AlertKind::Stopped,
                message: format!("{} Stopped ({watts:.1} W)", self.alias),
            });
        }
    }

    /// Regra (b): inatividade excessiva. Só avaliada com o dispositivo parado.
    fn check_idle(&mut self, now: f64, events: &mut Vec<AlertEvent>) {
        if self.state.is_running() {
            return;
        }
        let since_stop = now - self.state.last_stopped_at;
        let since_alert = now - self.state.last_idle_alert_at;
        if should_fire(
            self.state.idle_alert_armed,
            since_stop,
            since_alert,
            self.rules.max_idle_secs,
            self.rules.repeat_idle_alert_secs,
        ) {
            self.state.last_idle_alert_at = now;
            self.state.idle_alert_armed = true;
            events.push(AlertEvent {
                kind: AlertKind::Idle,
                message: format!(
                    "{} did not start for the last {:.2} minutes",
                    self.alias,
                    since_stop / 60.0
                ),
            });
        }
    }

    /// Regra (c): funcionamento excessivo. Simétrica à (b).
    fn check_running(&mut self, now: f64, events: &mut Vec<AlertEvent>) {
        if self.state.is_stopped() {
            return;
        }
        let since_start = now - self.state.last_started_at;
        let since_alert = now - self.state.last_run_alert_at;
        if should_fire(
            self.state.run_alert_armed,
            since_start,
            since_alert,
            self.rules.max_run_secs,
            self.rules.repeat_run_alert_secs,
        ) {
            self.state.last_run_alert_at = now;
            self.state.run_alert_armed = true;
            events.push(AlertEvent {
                kind: AlertKind::Running,
                message: format!(
                    "{} running for more than {:.2} minutes",
                    self.alias,
                    since_start / 60.0
                ),
            });
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(max_idle: f64, rep_idle: f64, max_run: f64, rep_run: f64) -> AlertRules {
        AlertRules {
            max_idle_secs: max_idle,
            repeat_idle_alert_secs: rep_idle,
            max_run_secs: max_run,
            repeat_run_alert_secs: rep_run,
        }
    }

    /// Regras largas o bastante para nunca dispararem nos testes de transição.
    fn quiet_monitor(threshold: f64) -> DeviceMonitor {
        DeviceMonitor::new("Lavadora", threshold, rules(1e9, 1e9, 1e9, 1e9), 0.0)
    }

    fn kinds(events: &[AlertEvent]) -> Vec<AlertKind> {
        events.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn start_transition_updates_state() {
        let mut m = quiet_monitor(5.0);
        let ev = m.observe(&PowerSample::from_watts(8.0), 10.0).unwrap();
        assert_eq!(kinds(&ev), vec![AlertKind::Started]);
        assert!(m.state().is_running());
        assert_eq!(m.state().last_started_at, 10.0);
        assert!(!m.state().run_alert_armed);
    }

    #[test]
    fn stop_transition_updates_state() {
        let mut m = quiet_monitor(5.0);
        m.observe(&PowerSample::from_watts(8.0), 1.0).unwrap();
        let ev = m.observe(&PowerSample::from_watts(2.0), 7.0).unwrap();
        assert_eq!(kinds(&ev), vec![AlertKind::Stopped]);
        assert!(m.state().is_stopped());
        assert_eq!(m.state().last_stopped_at, 7.0);
        assert!(!m.state().idle_alert_armed);
    }

    #[test]
    fn power_at_threshold_does_not_start() {
        // Início exige potência estritamente acima do limiar
        let mut m = quiet_monitor(5.0);
        let ev = m.observe(&PowerSample::from_watts(5.0), 1.0).unwrap();
        assert!(ev.is_empty());
        assert!(m.state().is_stopped());
    }

    #[test]
    fn repeated_samples_are_idempotent() {
        let mut m = quiet_monitor(5.0);
        assert!(m.observe(&PowerSample::from_watts(1.0), 1.0).unwrap().is_empty());
        assert!(m.observe(&PowerSample::from_watts(1.0), 2.0).unwrap().is_empty());
        m.observe(&PowerSample::from_watts(9.0), 3.0).unwrap();
        assert!(m.observe(&PowerSample::from_watts(9.0), 4.0).unwrap().is_empty());
    }

    #[test]
    fn scenario_two_two_eight_eight_two() {
        // threshold 5 W, potências [2,2,8,8,2] em t=[0,1,2,3,4]
        let mut m = quiet_monitor(5.0);
        let powers = [2.0, 2.0, 8.0, 8.0, 2.0];
        let mut all = Vec::new();
        for (t, p) in powers.iter().enumerate() {
            let ev = m.observe(&PowerSample::from_watts(*p), t as f64).unwrap();
            all.push(kinds(&ev));
        }
        assert_eq!(
            all,
            vec![
                vec![],
                vec![],
                vec![AlertKind::Started],
                vec![],
                vec![AlertKind::Stopped],
            ]
        );
    }

    #[test]
    fn milliwatt_samples_use_normalized_watts_for_transitions() {
        // 8000 mW = 8 W > 5 W → liga; 2000 mW = 2 W ≤ 5 W → desliga
        let mut m = quiet_monitor(5.0);
        let ev = m.observe(&PowerSample::from_milliwatts(8000.0), 1.0).unwrap();
        assert_eq!(kinds(&ev), vec![AlertKind::Started]);
        let ev = m.observe(&PowerSample::from_milliwatts(2000.0), 2.0).unwrap();
        assert_eq!(kinds(&ev), vec![AlertKind::Stopped]);
    }

    #[test]
    fn idle_rule_first_fire_and_repeat() {
        // max_idle 600 s, repetição 300 s, parado desde t=0
        let mut m = DeviceMonitor::new("Lavadora", 5.0, rules(600.0, 300.0, 1e9, 1e9), 0.0);
        let low = PowerSample::from_watts(0.0);

        assert!(m.observe(&low, 599.0).unwrap().is_empty());

        let ev = m.observe(&low, 600.0).unwrap();
        assert_eq!(kinds(&ev), vec![AlertKind::Idle]);
        assert!(m.state().idle_alert_armed);
        assert_eq!(m.state().last_idle_alert_at, 600.0);

        // Armado: repete só após 300 s do último alerta
        assert!(m.observe(&low, 899.0).unwrap().is_empty());
        let ev = m.observe(&low, 900.0).unwrap();
        assert_eq!(kinds(&ev), vec![AlertKind::Idle]);
    }

    #[test]
    fn running_rule_first_fire_and_repeat() {
        // Ligado em t=0, max_run 3600 s, repetição 1800 s
        let mut m = DeviceMonitor::new("Lavadora", 5.0, rules(1e9, 1e9, 3600.0, 1800.0), 0.0);
        let high = PowerSample::from_watts(9.0);

        let ev = m.observe(&high, 0.0).unwrap();
        assert_eq!(kinds(&ev), vec![AlertKind::Started]);

        let ev = m.observe(&high, 3600.0).unwrap();
        assert_eq!(kinds(&ev), vec![AlertKind::Running]);
        assert!(m.state().run_alert_armed);

        // 1 s depois do alerta: nada
        assert!(m.observe(&high, 3601.0).unwrap().is_empty());

        // 1800 s depois do último alerta: repete
        let ev = m.observe(&high, 5400.0).unwrap();
        assert_eq!(kinds(&ev), vec![AlertKind::Running]);
        assert!(m.observe(&high, 5401.0).unwrap().is_empty());
    }

    #[test]
    fn start_disarms_run_alert_for_new_cycle() {
        let mut m = DeviceMonitor::new("Lavadora", 5.0, rules(1e9, 1e9, 100.0, 50.0), 0.0);
        let high = PowerSample::from_watts(9.0);
        let low = PowerSample::from_watts(0.0);

        m.observe(&high, 0.0).unwrap();
        let ev = m.observe(&high, 100.0).unwrap();
        assert_eq!(kinds(&ev), vec![AlertKind::Running]);

        m.observe(&low, 110.0).unwrap();
        assert!(!m.state().run_alert_armed);

        // Novo ciclo: o primeiro disparo volta a exigir max_run inteiro
        m.observe(&high, 120.0).unwrap();
        assert!(m.observe(&high, 170.0).unwrap().is_empty());
        let ev = m.observe(&high, 220.0).unwrap();
        assert_eq!(kinds(&ev), vec![AlertKind::Running]);
    }

    #[test]
    fn transition_and_idle_never_fire_together_at_stop() {
        // A parada re-ancora a regra de inatividade na mesma observação
        let mut m = DeviceMonitor::new("Lavadora", 5.0, rules(600.0, 300.0, 1e9, 1e9), 0.0);
        m.observe(&PowerSample::from_watts(9.0), 1.0).unwrap();
        let ev = m.observe(&PowerSample::from_watts(0.0), 10_000.0).unwrap();
        assert_eq!(kinds(&ev), vec![AlertKind::Stopped]);
    }

    #[test]
    fn malformed_sample_mutates_nothing() {
        let mut m = quiet_monitor(5.0);
        let before = m.state().clone();
        let err = m.observe(&PowerSample::default(), 50.0).unwrap_err();
        assert_eq!(err, SampleError::MissingPower);
        let after = m.state();
        assert_eq!(before.running, after.running);
        assert_eq!(before.last_stopped_at, after.last_stopped_at);
        assert_eq!(before.last_sample, after.last_sample);
        assert!(after.last_sample.is_none());
    }

    #[test]
    fn alert_timestamps_are_monotonic() {
        let mut m = DeviceMonitor::new("Lavadora", 5.0, rules(10.0, 5.0, 1e9, 1e9), 0.0);
        let low = PowerSample::from_watts(0.0);
        let mut last = 0.0;
        for t in [10.0, 15.0, 16.0, 20.0, 40.0] {
            m.observe(&low, t).unwrap();
            assert!(m.state().last_idle_alert_at >= last);
            last = m.state().last_idle_alert_at;
        }
    }
}
