use llm_footprint::config::{AttnConfig, ConfigError, FullAttnConfig, ModelConfig};
use std::path::{Path, PathBuf};

fn hf_config(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("hf_config")
        .join(name)
}

#[test]
fn test_all_bundled_configs_parse() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("hf_config");
    let mut parsed = 0;

    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let config = ModelConfig::from_json(&path)
            .unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
        assert!(config.num_hidden_layers > 0);
        parsed += 1;
    }

    assert!(parsed >= 4);
}

#[test]
fn test_qwen3_dense_mha() {
    let config = ModelConfig::from_json(&hf_config("qwen3-8B_config.json")).unwrap();

    assert_eq!(config.model_type, "qwen3");
    assert!(!config.is_moe());
    assert!(!config.is_hybrid);
    assert_eq!(config.intermediate_size, 12288);
    match &config.attn_config {
        AttnConfig::Mha(mha) => {
            assert_eq!(mha.num_attention_heads, 32);
            assert_eq!(mha.num_key_value_heads, 8);
            assert_eq!(mha.head_dim, 128);
        }
        other => panic!("expected MHA, got {}", other.name()),
    }
}

#[test]
fn test_deepseek_mla_and_aliases() {
    let config = ModelConfig::from_json(&hf_config("deepseek_671b_r1_config.json")).unwrap();

    assert_eq!(config.model_type, "deepseek_v3");
    assert_eq!(config.first_k_dense_replace, 3);

    let AttnConfig::Mla(mla) = &config.attn_config else {
        panic!("expected MLA, got {}", config.attn_config.name());
    };
    assert_eq!(mla.q_lora_rank, Some(1536));
    assert_eq!(mla.kv_lora_rank, 512);
    assert_eq!(mla.qk_head_dim, 192);

    // n_routed_experts / n_shared_experts
    let moe = config.moe_config.as_ref().unwrap();
    assert_eq!(moe.num_routed_experts, 256);
    assert_eq!(moe.num_shared_experts, 1);
    assert_eq!(moe.intermediate_size, 2048);
    assert_eq!(config.intermediate_size, 18432);
}

#[test]
fn test_qwen3_next_hybrid_layer_counts() {
    let config = ModelConfig::from_json(&hf_config("qwen3-next-80B-A3B_config.json")).unwrap();

    assert!(config.is_hybrid);
    assert_eq!(config.num_full_attn_layers, 12);
    assert_eq!(config.num_linear_attn_layers, 36);

    let AttnConfig::Hybrid(hybrid) = &config.attn_config else {
        panic!("expected hybrid attention");
    };
    assert!(matches!(hybrid.full_attn_config, FullAttnConfig::Mha(_)));
    assert_eq!(hybrid.linear_attn_config.num_value_heads, 32);

    // num_experts alias, no shared experts declared
    let moe = config.moe_config.as_ref().unwrap();
    assert_eq!(moe.num_routed_experts, 512);
    assert_eq!(moe.num_shared_experts, 0);
}

#[test]
fn test_partial_mla_fields_are_rejected() {
    let err = r#"{
        "hidden_size": 1024,
        "num_hidden_layers": 2,
        "num_attention_heads": 8,
        "kv_lora_rank": 128,
        "q_lora_rank": null,
        "intermediate_size": 4096
    }"#
    .parse::<ModelConfig>()
    .unwrap_err();

    match err {
        ConfigError::MissingField { field, shape } => {
            assert_eq!(field, "qk_nope_head_dim");
            assert_eq!(shape, "MLA");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.json");

    let err = ModelConfig::from_json(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
    assert!(err.to_string().contains("missing.json"));
}

#[test]
fn test_invalid_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
        ModelConfig::from_json(&path),
        Err(ConfigError::Parse(_))
    ));
}
