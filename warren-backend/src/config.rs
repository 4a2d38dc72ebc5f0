use std::env;

/// Process-wide configuration, built once at startup and shared read-only.
#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,

    /// Public base URL for webhook registration. When unset, registration
    /// is skipped (useful for local runs behind an existing tunnel).
    pub public_url: Option<String>,

    pub telegram_bot_token: String,

    pub bird_api_url: String,
    pub bird_organization_id: String,
    pub bird_workspace_id: String,
    pub bird_api_key: String,
    pub bird_signing_key: String,
    pub bird_channel_id: String,

    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_auth_scopes: Vec<String>,

    pub llm_endpoint: String,
    pub llm_api_key: String,
    pub llm_model: String,

    pub calendar_name: String,
    pub calendar_description: String,
    pub drive_folder_name: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a valid number"),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "./.db/warren.db".to_string()),
            public_url: env::var("PUBLIC_URL").ok(),
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN")
                .expect("TELEGRAM_BOT_TOKEN must be set"),
            bird_api_url: env::var("BIRD_API_URL")
                .unwrap_or_else(|_| "https://api.bird.com".to_string()),
            bird_organization_id: env::var("BIRD_ORGANIZATION_ID").unwrap_or_default(),
            bird_workspace_id: env::var("BIRD_WORKSPACE_ID").unwrap_or_default(),
            bird_api_key: env::var("BIRD_API_KEY").unwrap_or_default(),
            bird_signing_key: env::var("BIRD_SIGNING_KEY").unwrap_or_default(),
            bird_channel_id: env::var("BIRD_CHANNEL_ID").unwrap_or_default(),
            google_client_id: env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
            google_auth_scopes: env::var("GOOGLE_AUTH_SCOPE")
                .unwrap_or_else(|_| {
                    "https://www.googleapis.com/auth/calendar \
                     https://www.googleapis.com/auth/drive.file"
                        .to_string()
                })
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            llm_endpoint: env::var("LLM_ENDPOINT")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),
            llm_api_key: env::var("LLM_API_KEY").unwrap_or_default(),
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            calendar_name: env::var("CALENDAR_NAME")
                .unwrap_or_else(|_| "WarrenBot".to_string()),
            calendar_description: env::var("CALENDAR_DESCRIPTION")
                .unwrap_or_else(|_| "Events and data saved by WarrenBot".to_string()),
            drive_folder_name: env::var("DRIVE_FOLDER_NAME")
                .unwrap_or_else(|_| "WarrenBot Uploads".to_string()),
        }
    }
}
