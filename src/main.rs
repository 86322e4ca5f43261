//! Engine entry point — loads configs, wires the services, serves HTTP.

use anyhow::Result;
use maum_engine::chat::{self, ChatPipeline};
use maum_engine::config;
use maum_engine::emotion;
use maum_engine::llm::{self, LlmService};
use maum_engine::policy::{self, ProactivePolicy};
use maum_engine::server::{self, AppState};
use maum_engine::session::SessionStore;
use maum_engine::stt::{self, SttService};
use maum_engine::tts::{self, TtsService};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let data_dir = config::data_dir();
    let engine_config = config::load_engine_config(&data_dir.join("engine_config.json"));
    let llm_config = llm::load_config(&data_dir.join("llm_config.json"));
    let stt_config = stt::load_config(&data_dir.join("stt_config.json"));
    let tts_config = tts::load_config(&data_dir.join("tts_config.json"));
    let policy_config = policy::config::load_config(&data_dir.join("policy_config.json"));
    let chat_config = chat::load_config(&data_dir.join("chat_config.json"));
    let emotion_config = emotion::load_config(&data_dir.join("emotion_config.json"));

    let store = Arc::new(SessionStore::new(chat_config.history_window));
    let policy = Arc::new(ProactivePolicy::new(store.clone(), policy_config));
    let pipeline = Arc::new(ChatPipeline::new(
        store.clone(),
        policy.clone(),
        LlmService::from_config(llm_config),
        SttService::init_from_config(&stt_config),
        TtsService::init_from_config(&tts_config),
        chat_config,
        emotion_config,
    ));

    let state = AppState {
        store,
        policy,
        pipeline,
    };

    let addr = SocketAddr::from((engine_config.host, engine_config.port));
    tracing::info!("[Engine] Listening on {}", addr);
    warp::serve(server::routes(state)).run(addr).await;

    Ok(())
}
