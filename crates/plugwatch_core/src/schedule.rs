//! Política de repetição de alertas.
//!
//! As regras de inatividade e de funcionamento excessivo usam a mesma
//! política: dispara uma vez ao ultrapassar o limiar inicial e depois
//! repete numa cadência fixa, até que a transição oposta desarme o alerta.
//! Função pura de durações, testável sem relógio.

/// Decide se um alerta deve disparar agora.
///
/// - Desarmado: dispara quando `since_anchor` (tempo desde a última
///   transição-âncora) atinge `first_threshold`.
/// - Armado: dispara quando `since_last_alert` atinge `repeat_interval`.
///
/// Todos os valores em segundos.
pub fn should_fire(
    armed: bool,
    since_anchor: f64,
    since_last_alert: f64,
    first_threshold: f64,
    repeat_interval: f64,
) -> bool {
    if armed {
        since_last_alert >= repeat_interval
    } else {
        since_anchor >= first_threshold
    }
}
