//! Static model allow-lists per provider.

use gateway_core::{ModelDescriptor, ProviderKind};

/// Models served by a provider kind, in listing order
#[must_use]
pub fn default_models(kind: ProviderKind) -> Vec<ModelDescriptor> {
    let id = kind.id();
    let m = |upstream: &str| ModelDescriptor::new(id, upstream);

    match kind {
        ProviderKind::DeepInfra => vec![
            m("meta-llama/Llama-3.3-70B-Instruct")
                .with_display_name("Llama 3.3 70B")
                .with_tools(),
            m("meta-llama/Llama-3.2-90B-Vision-Instruct")
                .with_display_name("Llama 3.2 90B Vision")
                .with_vision(),
            m("deepseek-ai/DeepSeek-V3").with_display_name("DeepSeek V3"),
            m("deepseek-ai/DeepSeek-R1").with_display_name("DeepSeek R1"),
            m("Qwen/Qwen2.5-72B-Instruct")
                .with_display_name("Qwen 2.5 72B")
                .with_tools(),
            m("mistralai/Mistral-Small-24B-Instruct-2501").with_display_name("Mistral Small 3"),
        ],
        ProviderKind::MakeHub => vec![
            m("openai/gpt-4o")
                .with_display_name("GPT-4o (MakeHub)")
                .with_tools()
                .with_vision(),
            m("anthropic/claude-3-5-sonnet")
                .with_display_name("Claude 3.5 Sonnet (MakeHub)")
                .with_tools(),
        ],
        ProviderKind::LaoZhang => vec![
            m("gpt-4o-mini")
                .with_display_name("GPT-4o mini")
                .with_tools()
                .with_vision(),
            m("claude-3-7-sonnet-20250219")
                .with_display_name("Claude 3.7 Sonnet")
                .with_tools(),
        ],
        ProviderKind::TypeGpt => vec![
            m("gpt-4.1").with_display_name("GPT-4.1").with_tools(),
            m("deepseek-r1").with_display_name("DeepSeek R1 (TypeGPT)"),
        ],
        ProviderKind::Codex => vec![m("codex-mini-latest")
            .with_display_name("Codex Mini")
            .with_tools()],
        ProviderKind::A4f => vec![
            m("provider-3/gpt-4o-mini").with_display_name("GPT-4o mini (A4F)"),
            m("provider-1/deepseek-v3").with_display_name("DeepSeek V3 (A4F)"),
        ],
        ProviderKind::Workers => vec![
            m("@cf/meta/llama-3.1-8b-instruct").with_display_name("Llama 3.1 8B (FeatherLabs)"),
            m("@cf/qwen/qwq-32b").with_display_name("QwQ 32B"),
        ],
        ProviderKind::Google => vec![
            m("gemini-2.0-flash")
                .with_display_name("Gemini 2.0 Flash")
                .with_tools()
                .with_vision(),
            m("gemini-2.0-flash")
                .with_internal_id("gemini-2.0-flash-search")
                .with_display_name("Gemini 2.0 Flash Search")
                .with_vision(),
            m("gemini-2.0-flash-lite")
                .with_display_name("Gemini 2.0 Flash Lite")
                .with_vision(),
            m("gemini-1.5-pro")
                .with_display_name("Gemini 1.5 Pro")
                .with_tools()
                .with_vision(),
        ],
        ProviderKind::Grok => vec![m("grok-3").with_display_name("Grok 3")],
        ProviderKind::GptOss => vec![m("gpt-oss-120b").with_display_name("GPT-OSS 120B")],
        ProviderKind::SonnetFree => {
            vec![m("claude-sonnet-4").with_display_name("Claude Sonnet 4 (Free)")]
        }
    }
}

/// Entries whose internal id ends with this suffix ask the upstream to ground
/// answers with web search
pub const SEARCH_SUFFIX: &str = "-search";
