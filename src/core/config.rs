use std::env;

use crate::ai::prompt;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm_api_hostname: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub system_prompt: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let llm_api_hostname =
            env::var("PULSE_LLM_HOST").unwrap_or_else(|_| "https://api.openai.com".to_string());
        // A missing key is reported per request (500 on the chat route)
        // rather than at startup
        let llm_api_key = env::var("OPENAI_API_KEY").ok();
        let llm_model =
            env::var("PULSE_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let system_prompt =
            env::var("PULSE_SYSTEM_PROMPT").unwrap_or_else(|_| prompt::system_prompt());

        Self {
            llm_api_hostname,
            llm_api_key,
            llm_model,
            system_prompt,
        }
    }
}
