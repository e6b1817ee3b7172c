//! Backend LAN – descoberta UDP com escuta em thread própria (push).
//!
//! Uma thread manda o beacon de descoberta em broadcast num intervalo
//! configurável e escuta as respostas dos aparelhos na rede. Respostas do
//! alias monitorado que trazem leitura do medidor viram amostras num
//! channel bounded; o loop principal consome com `recv` bloqueante.
//!
//! Erro fatal de socket encerra a thread sem reconectar — o channel
//! desconecta e o monitoramento termina.

use super::tplink;
use super::{SampleSource, SourceError};
use crossbeam_channel::{Receiver, Sender, bounded};
use plugwatch_core::PowerSample;
use plugwatch_core::config::LanConfig;
use std::net::UdpSocket;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Fonte push: amostras chegam da thread de descoberta via channel.
pub struct LanSource {
    rx: Receiver<PowerSample>,
}

impl LanSource {
    /// Sobe a thread de descoberta e devolve a fonte.
    pub fn spawn(cfg: &LanConfig, alias: &str) -> Self {
        let (tx, rx) = bounded::<PowerSample>(64);
        let cfg = cfg.clone();
        let alias = alias.to_string();

        let spawned = std::thread::Builder::new()
            .name("lan-discovery".into())
            .spawn(move || discovery_loop(&tx, &cfg, &alias));
        if let Err(e) = spawned {
            // Sem a thread o sender é dropado e o channel desconectado
            // encerra o monitoramento no primeiro recv
            error!("Falha ao criar thread de descoberta: {e}");
        }

        Self { rx }
    }
}

impl SampleSource for LanSource {
    fn next_sample(&mut self) -> Result<PowerSample, SourceError> {
        self.rx.recv().map_err(|_| SourceError::Disconnected)
    }
}

fn discovery_loop(tx: &Sender<PowerSample>, cfg: &LanConfig, alias: &str) {
    let sock = match UdpSocket::bind("0.0.0.0:0") {
        Ok(s) => s,
        Err(e) => {
            error!("Falha ao criar socket UDP: {e}");
            return;
        }
    };
    if let Err(e) = sock.set_broadcast(true) {
        error!("Falha ao habilitar broadcast: {e}");
        return;
    }
    if let Err(e) = sock.set_read_timeout(Some(Duration::from_secs(1))) {
        error!("Falha ao configurar timeout de leitura: {e}");
        return;
    }

    let dest = format!("{}:{}", cfg.broadcast_addr, cfg.port);
    let interval = Duration::from_secs_f64(cfg.discovery_interval_secs);
    let beacon = tplink::scramble(tplink::DISCOVERY_QUERY.as_bytes());
    let mut last_beacon: Option<Instant> = None;

    info!("Descoberta LAN ativa → {dest} (beacon a cada {:.1}s)", cfg.discovery_interval_secs);

    let mut buf = [0u8; 4096];
    loop {
        let due = last_beacon.is_none_or(|t| t.elapsed() >= interval);
        if due {
            if let Err(e) = sock.send_to(&beacon, &dest) {
                warn!("Erro ao enviar beacon de descoberta: {e}");
            }
            last_beacon = Some(Instant::now());
        }

        match sock.recv_from(&mut buf) {
            Ok((size, addr)) => match tplink::parse_discovery_datagram(&buf[..size]) {
                Ok(reply) if reply.alias == alias => match reply.sample {
                    Some(sample) => {
                        // Non-blocking send: loop principal lento descarta
                        if tx.try_send(sample).is_err() {
                            debug!("Channel cheio, descartando amostra");
                        }
                    }
                    None => warn!("{alias} respondeu sem leitura de medidor"),
                },
                Ok(reply) => {
                    debug!("Ignorando {:?} de {}", reply.alias, addr.ip());
                }
                Err(e) => {
                    debug!("Datagrama inválido de {}: {e}", addr.ip());
                }
            },
            Err(ref e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                // Timeout normal, continua
            }
            Err(e) => {
                error!("Erro fatal no socket de descoberta: {e}");
                return;
            }
        }
    }
}
