//! # PlugWatch Monitor
//!
//! Observa uma tomada inteligente (uma só) e converte as leituras de
//! potência em eventos: dispositivo ligou, desligou, parado demais,
//! funcionando demais. Cada evento vira log + notificação.
//!
//! ## Uso
//! ```bash
//! plugwatch_monitor              # config.toml ao lado do executável
//! RUST_LOG=debug plugwatch_monitor
//! ```

mod notifier;
mod source;

use notifier::Notifier;
use plugwatch_core::DeviceMonitor;
use plugwatch_core::config::AppConfig;
use source::SampleSource;
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

fn main() {
    // ── Carregar config ──
    // Antes do subscriber: os logs internos do load ainda não aparecem,
    // o caminho é re-logado logo após a inicialização
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);
    let log_path = config.log_path();

    // ── Logging: console + arquivo (o notifier lê esse arquivo) ──
    init_logging(&log_path);
    info!("Configuração: {}", config_path.display());
    info!("Log em arquivo: {}", log_path.display());

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    // ── Validação ──
    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Config inválida: {e}");
        }
        std::process::exit(2);
    }

    let rules = &config.rules;
    info!("Inatividade aceitável          : {:.2} minutos", rules.max_idle_secs / 60.0);
    info!("Alerta de inatividade a cada   : {:.2} minutos", rules.repeat_idle_alert_secs / 60.0);
    info!("Funcionamento aceitável        : {:.2} minutos", rules.max_run_secs / 60.0);
    info!("Alerta de funcionamento a cada : {:.2} minutos", rules.repeat_run_alert_secs / 60.0);

    // ── Engine + Notifier ──
    let mut engine = DeviceMonitor::new(
        config.device.alias.clone(),
        config.device.power_threshold_watts,
        config.rules.clone(),
        epoch_secs(),
    );
    let notifier = Notifier::new(config.notifier.clone(), log_path);

    // ── Fonte de telemetria ──
    let mut src = match source::build_source(&config.telemetry, &config.device.alias) {
        Ok(src) => src,
        Err(e) => {
            error!("Falha ao iniciar backend de telemetria: {e}");
            std::process::exit(1);
        }
    };

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   ⚡ PLUGWATCH MONITOR – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Dispositivo: {}", config.device.alias);
    println!("  Limiar:      {:.1} W", config.device.power_threshold_watts);
    println!("  Backend:     {}", config.telemetry.backend);
    println!("══════════════════════════════════════════════");
    println!();

    info!("-----Monitoramento iniciado!-----");
    info!("-----   usando API {}   -----", config.telemetry.backend.to_uppercase());

    run_loop(src.as_mut(), &mut engine, &notifier);

    // Fim de fonte é definitivo: reinício fica com o supervisor do processo
    info!("Monitoramento encerrado");
}

/// Loop principal: uma amostra processada por completo (estado atualizado,
/// alertas emitidos e entregues) antes de pedir a próxima.
fn run_loop(source: &mut dyn SampleSource, engine: &mut DeviceMonitor, notifier: &Notifier) {
    loop {
        match source.next_sample() {
            Ok(sample) => match engine.observe(&sample, epoch_secs()) {
                Ok(events) => {
                    for event in events {
                        info!("{}", event.message);
                        notifier.notify(&event.message);
                    }
                }
                Err(e) => warn!("Amostra malformada descartada: {e}"),
            },
            Err(e) => {
                error!("Fonte de telemetria encerrada: {e}");
                break;
            }
        }
    }
}

/// Console + arquivo de log plano. Sem o arquivo (ex.: diretório sem
/// permissão de escrita) segue só com console.
fn init_logging(log_path: &Path) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    match std::fs::OpenOptions::new().create(true).append(true).open(log_path) {
        Ok(file) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer())
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .init();
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer())
                .init();
            warn!("Sem log em arquivo ({}): {e}", log_path.display());
        }
    }
}

/// Agora em segundos epoch, como o engine espera.
fn epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
