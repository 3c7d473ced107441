use rl_domain::config::Config;

#[test]
fn default_tool_timeout_is_five_minutes() {
    let config = Config::default();
    assert_eq!(config.tools.call_timeout_secs, 300);
}

#[test]
fn default_sampling_matches_turn_loop() {
    let config = Config::default();
    assert_eq!(config.llm.temperature, 0.7);
    assert_eq!(config.llm.max_tokens, 4096);
    assert_eq!(config.turn.max_rounds, 25);
    assert_eq!(config.turn.summarizer_temperature, 0.5);
}

#[test]
fn history_is_uncompressed_by_default() {
    let config = Config::default();
    assert!(!config.history.compressed);
}

#[test]
fn explicit_llm_section_parses() {
    let toml_str = r#"
[llm]
base_url = "http://localhost:8000/v1"
model = "local-7b"
temperature = 0.2
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.llm.base_url, "http://localhost:8000/v1");
    assert_eq!(config.llm.model, "local-7b");
    assert_eq!(config.llm.temperature, 0.2);
    // Unspecified fields keep defaults.
    assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
    assert_eq!(config.llm.timeout_secs, 120);
}

#[test]
fn partial_sections_keep_defaults() {
    let toml_str = r#"
[history]
compressed = true

[tools]
call_timeout_secs = 30
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert!(config.history.compressed);
    assert_eq!(config.tools.call_timeout_secs, 30);
    assert_eq!(config.turn.max_rounds, 25);
}
