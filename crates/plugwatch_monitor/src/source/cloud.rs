//! Backend cloud – polling autenticado na conta TP-Link (pull).
//!
//! Fluxo da API: `login` (token) → `getDeviceList` (resolve o alias em
//! deviceId + appServerUrl) → `passthrough` com a query de medidor a cada
//! leitura. Entre leituras a fonte dorme o intervalo configurado.
//!
//! Política deliberada: qualquer erro de leitura é devolvido e encerra o
//! loop de monitoramento em definitivo. Nada de retry automático contra
//! uma API de conta com rate limit — quem reinicia é o supervisor.

use super::tplink;
use super::{SampleSource, SourceError};
use plugwatch_core::PowerSample;
use plugwatch_core::config::CloudConfig;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// Identificador de terminal exigido pelo login da API.
const TERMINAL_UUID: &str = "3f8a2c1e-0000-4000-8000-plugwatch001";

/// Timeout das chamadas HTTP.
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Envelope padrão das respostas da API cloud.
#[derive(Debug, Deserialize)]
struct CloudReply<T> {
    error_code: i64,
    #[serde(default)]
    msg: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct LoginResult {
    token: String,
}

#[derive(Debug, Deserialize)]
struct DeviceListResult {
    #[serde(rename = "deviceList")]
    device_list: Vec<CloudDevice>,
}

#[derive(Debug, Deserialize)]
struct CloudDevice {
    #[serde(default)]
    alias: String,
    #[serde(rename = "deviceId")]
    device_id: String,
    #[serde(rename = "appServerUrl", default)]
    app_server_url: String,
}

#[derive(Debug, Deserialize)]
struct PassthroughResult {
    #[serde(rename = "responseData")]
    response_data: String,
}

/// Fonte pull: uma leitura por chamada, com espera entre leituras.
pub struct CloudSource {
    client: reqwest::blocking::Client,
    token: String,
    device_id: String,
    /// Endpoint regional devolvido no getDeviceList
    app_server_url: String,
    interval: Duration,
    first_read_done: bool,
}

impl CloudSource {
    /// Autentica na conta e resolve o dispositivo pelo alias.
    pub fn connect(cfg: &CloudConfig, alias: &str) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?;

        let login: LoginResult = call(
            &client,
            &cfg.endpoint,
            None,
            &json!({
                "method": "login",
                "params": {
                    "appType": "Kasa_Android",
                    "cloudUserName": cfg.username,
                    "cloudPassword": cfg.password,
                    "terminalUUID": TERMINAL_UUID,
                },
            }),
        )?;
        info!("Login na cloud OK");

        let devices: DeviceListResult = call(
            &client,
            &cfg.endpoint,
            Some(&login.token),
            &json!({ "method": "getDeviceList" }),
        )?;

        let device = devices
            .device_list
            .into_iter()
            .find(|d| d.alias == alias)
            .ok_or_else(|| SourceError::DeviceNotFound(alias.to_string()))?;
        info!("Dispositivo {alias:?} encontrado (deviceId …{})", tail(&device.device_id, 6));

        let app_server_url = if device.app_server_url.is_empty() {
            cfg.endpoint.clone()
        } else {
            device.app_server_url
        };

        Ok(Self {
            client,
            token: login.token,
            device_id: device.device_id,
            app_server_url,
            interval: Duration::from_secs_f64(cfg.poll_interval_secs),
            first_read_done: false,
        })
    }

    fn read_power(&self) -> Result<PowerSample, SourceError> {
        let reply: PassthroughResult = call(
            &self.client,
            &self.app_server_url,
            Some(&self.token),
            &json!({
                "method": "passthrough",
                "params": {
                    "deviceId": self.device_id,
                    "requestData": tplink::EMETER_QUERY,
                },
            }),
        )?;
        debug!("responseData: {}", reply.response_data);
        Ok(tplink::parse_emeter_reply(&reply.response_data)?)
    }
}

impl SampleSource for CloudSource {
    fn next_sample(&mut self) -> Result<PowerSample, SourceError> {
        // Primeira leitura imediata; depois, espera configurada entre leituras
        if self.first_read_done {
            std::thread::sleep(self.interval);
        } else {
            self.first_read_done = true;
        }
        self.read_power()
    }
}

/// POST JSON → envelope cloud → `result`.
fn call<T: DeserializeOwned>(
    client: &reqwest::blocking::Client,
    url: &str,
    token: Option<&str>,
    body: &serde_json::Value,
) -> Result<T, SourceError> {
    let mut req = client.post(url);
    if let Some(token) = token {
        req = req.query(&[("token", token)]);
    }
    let reply: CloudReply<T> = req.json(body).send()?.error_for_status()?.json()?;

    if reply.error_code != 0 {
        return Err(SourceError::Cloud(format!(
            "error_code {} ({})",
            reply.error_code,
            reply.msg.unwrap_or_default()
        )));
    }
    reply
        .result
        .ok_or_else(|| SourceError::Cloud("resposta sem campo result".into()))
}

/// Últimos `n` chars, para logar identificadores sem vazá-los inteiros.
fn tail(s: &str, n: usize) -> &str {
    &s[s.len().saturating_sub(n)..]
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_envelope_parses() {
        let reply: CloudReply<LoginResult> =
            serde_json::from_str(r#"{"error_code":0,"result":{"token":"abc123"}}"#).unwrap();
        assert_eq!(reply.error_code, 0);
        assert_eq!(reply.result.unwrap().token, "abc123");
    }

    #[test]
    fn error_envelope_carries_msg() {
        let reply: CloudReply<LoginResult> =
            serde_json::from_str(r#"{"error_code":-20601,"msg":"Account not found"}"#).unwrap();
        assert_eq!(reply.error_code, -20601);
        assert!(reply.result.is_none());
        assert_eq!(reply.msg.as_deref(), Some("Account not found"));
    }

    #[test]
    fn device_list_parses() {
        let reply: CloudReply<DeviceListResult> = serde_json::from_str(
            r#"{"error_code":0,"result":{"deviceList":[
                {"alias":"Lavadora","deviceId":"80061A2B3C","appServerUrl":"https://eu-wap.tplinkcloud.com"},
                {"alias":"Abajur","deviceId":"80064D5E6F"}
            ]}}"#,
        )
        .unwrap();
        let list = reply.result.unwrap().device_list;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].alias, "Lavadora");
        assert_eq!(list[0].app_server_url, "https://eu-wap.tplinkcloud.com");
        assert!(list[1].app_server_url.is_empty());
    }

    #[test]
    fn tail_is_safe_on_short_strings() {
        assert_eq!(tail("abc", 6), "abc");
        assert_eq!(tail("80061A2B3C", 6), "1A2B3C");
    }
}
