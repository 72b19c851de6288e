//! Status-API – HTTP-Flaeche neben dem TCP-Hub
//!
//! Endpunkte:
//! - `GET /`        – Banner mit Willkommensnachricht und Online-Zahl
//! - `GET /status`  – Statusabfrage fuer Clients und Monitoring
//! - `GET /metrics` – Prometheus-Scrape-Format

use anyhow::Result;
use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use chrono::Utc;
use plausch_hub::HubState;
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Prometheus-Metriken des Hubs
///
/// Gauges werden beim Scrape direkt gesetzt; die monotonen Zaehler
/// ziehen die Differenz zu den Hub-internen Zaehlern nach.
#[derive(Clone)]
pub struct HubMetriken {
    registry: Arc<Registry>,
    sitzungen_online: IntGauge,
    kanaele_gesamt: IntGauge,
    nachrichten_gesamt: IntCounter,
    signale_gesamt: IntCounter,
}

impl HubMetriken {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let sitzungen_online = IntGauge::with_opts(Opts::new(
            "plausch_sitzungen_online",
            "Anzahl aktuell angemeldeter Sitzungen",
        ))?;
        registry.register(Box::new(sitzungen_online.clone()))?;

        let kanaele_gesamt = IntGauge::with_opts(Opts::new(
            "plausch_kanaele_gesamt",
            "Anzahl existierender Kanaele",
        ))?;
        registry.register(Box::new(kanaele_gesamt.clone()))?;

        let nachrichten_gesamt = IntCounter::with_opts(Opts::new(
            "plausch_nachrichten_gesamt",
            "Gesamtanzahl angehaengter Nachrichten",
        ))?;
        registry.register(Box::new(nachrichten_gesamt.clone()))?;

        let signale_gesamt = IntCounter::with_opts(Opts::new(
            "plausch_signale_gesamt",
            "Gesamtanzahl weitergeleiteter WebRTC-Signale",
        ))?;
        registry.register(Box::new(signale_gesamt.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            sitzungen_online,
            kanaele_gesamt,
            nachrichten_gesamt,
            signale_gesamt,
        })
    }

    /// Liest die Hub-Zaehler zum Scrape-Zeitpunkt aus
    fn aktualisieren(&self, state: &HubState) {
        self.sitzungen_online.set(state.register.anzahl() as i64);
        self.kanaele_gesamt.set(state.verzeichnis.anzahl() as i64);

        // Counter sind monoton: nur die Differenz seit dem letzten Scrape nachziehen
        let nachrichten = state.nachrichten.gesamt_anzahl();
        self.nachrichten_gesamt
            .inc_by(nachrichten.saturating_sub(self.nachrichten_gesamt.get()));
        let signale = state.relay.anzahl_weitergeleitet();
        self.signale_gesamt
            .inc_by(signale.saturating_sub(self.signale_gesamt.get()));
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let familien = self.registry.gather();
        let mut puffer = Vec::new();
        encoder.encode(&familien, &mut puffer)?;
        Ok(String::from_utf8(puffer)?)
    }
}

/// Axum-State der Status-API
#[derive(Clone)]
pub struct StatusState {
    state: Arc<HubState>,
    metriken: HubMetriken,
}

impl StatusState {
    pub fn neu(state: Arc<HubState>) -> Result<Self> {
        Ok(Self {
            state,
            metriken: HubMetriken::neu()?,
        })
    }
}

/// Erstellt den vollstaendigen Status-Router
pub fn status_router(state: StatusState) -> Router {
    Router::new()
        .route("/", get(wurzel_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `GET /` – Banner wie ihn Browser und Uptime-Checks sehen
async fn wurzel_handler(State(status): State<StatusState>) -> impl IntoResponse {
    let config = &status.state.config;
    let nachricht = config
        .willkommensnachricht
        .clone()
        .unwrap_or_else(|| format!("{} ist erreichbar", config.hub_name));

    Json(serde_json::json!({
        "message": nachricht,
        "online_users": status.state.register.anzahl(),
        "status": "ACTIVE",
    }))
}

/// `GET /status` – Statusabfrage fuer Clients und Monitoring
async fn status_handler(State(status): State<StatusState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "online": true,
        "users_online": status.state.register.anzahl(),
        "rooms_count": status.state.verzeichnis.anzahl(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// `GET /metrics` – Prometheus-Scrape
async fn metrics_handler(State(status): State<StatusState>) -> impl IntoResponse {
    status.metriken.aktualisieren(&status.state);
    match status.metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(fehler) => {
            tracing::error!(fehler = %fehler, "Metriken-Export fehlgeschlagen");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Startet die Status-API und laeuft bis zum Shutdown-Signal
pub async fn starten(
    bind_addr: SocketAddr,
    state: Arc<HubState>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let app = status_router(StatusState::neu(state)?);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(adresse = %bind_addr, "Status-API gestartet");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use plausch_hub::HubConfig;

    fn test_state() -> Arc<HubState> {
        HubState::neu(HubConfig::default()).unwrap()
    }

    #[test]
    fn metriken_namen_im_export() {
        let state = test_state();
        let metriken = HubMetriken::neu().unwrap();
        metriken.aktualisieren(&state);

        let export = metriken.exportieren().unwrap();
        assert!(export.contains("plausch_sitzungen_online"));
        assert!(export.contains("plausch_kanaele_gesamt"));
        assert!(export.contains("plausch_nachrichten_gesamt"));
        assert!(export.contains("plausch_signale_gesamt"));
        assert!(export.contains("# HELP"));
        assert!(export.contains("# TYPE"));
    }

    #[test]
    fn gauges_spiegeln_den_hub_zustand() {
        let state = test_state();
        let metriken = HubMetriken::neu().unwrap();
        metriken.aktualisieren(&state);

        // Frischer Hub: keine Sitzungen, nur der Standard-Kanal
        assert_eq!(metriken.sitzungen_online.get(), 0);
        assert_eq!(metriken.kanaele_gesamt.get(), 1);
    }

    #[test]
    fn counter_ziehen_nur_die_differenz_nach() {
        let state = test_state();
        let kanal = state.standard_kanal.expect("Standard-Kanal fehlt");
        let metriken = HubMetriken::neu().unwrap();

        state.nachrichten.system_notiz(kanal, "eins".into()).unwrap();
        metriken.aktualisieren(&state);
        assert_eq!(metriken.nachrichten_gesamt.get(), 1);

        // Wiederholtes Scrapen ohne neue Nachrichten veraendert nichts
        metriken.aktualisieren(&state);
        assert_eq!(metriken.nachrichten_gesamt.get(), 1);

        state.nachrichten.system_notiz(kanal, "zwei".into()).unwrap();
        metriken.aktualisieren(&state);
        assert_eq!(metriken.nachrichten_gesamt.get(), 2);
    }
}
