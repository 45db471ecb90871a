use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use word_lookup_rust::settings::Settings;
use word_lookup_rust::{
    FixedTable, PartialRecord, Resolver, ResolverOptions, Source, SourceFuture, SourceRole,
    WordCache, build_resolver, lookup_lines,
};

struct Glossary {
    role: SourceRole,
    calls: Arc<AtomicUsize>,
}

impl Source for Glossary {
    fn name(&self) -> &'static str {
        "glossary"
    }

    fn role(&self) -> SourceRole {
        self.role
    }

    fn attempt(&self, word: &str) -> SourceFuture {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let word = word.to_string();
        let role = self.role;
        Box::pin(async move {
            Ok(match (role, word.as_str()) {
                (SourceRole::Translation, "cat") => Some(PartialRecord::translation("gato")),
                (SourceRole::Dictionary, "cat") => Some(
                    PartialRecord::default()
                        .with_phonetic("/kæt/")
                        .with_audio("https://audio.example/cat.mp3"),
                ),
                _ => None,
            })
        })
    }
}

fn glossary(calls: &Arc<AtomicUsize>) -> Vec<Arc<dyn Source>> {
    vec![
        Arc::new(Glossary {
            role: SourceRole::Dictionary,
            calls: calls.clone(),
        }),
        Arc::new(Glossary {
            role: SourceRole::Translation,
            calls: calls.clone(),
        }),
    ]
}

#[tokio::test]
async fn cached_lookups_survive_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fixed_path = dir.path().join("fixed_words.json");
    let cache_path = dir.path().join("automatic_words.json");
    std::fs::write(
        &fixed_path,
        r#"{"good morning": {"translation": "bom dia", "phonetic": "/ɡʊd ˈmɔːnɪŋ/", "audio": "https://audio.example/gm.mp3"}}"#,
    )
    .expect("write fixed");

    let calls = Arc::new(AtomicUsize::new(0));
    let fixed = FixedTable::load_file(&fixed_path).expect("fixed");
    let cache = WordCache::open(&cache_path, 100, Duration::from_millis(10))
        .await
        .expect("cache");
    let resolver = Resolver::new(
        Arc::new(cache),
        Arc::new(fixed),
        glossary(&calls),
        ResolverOptions::default(),
    );

    let cat = resolver.resolve("  Cat ").await.expect("cat");
    assert_eq!(cat.word, "cat");
    assert_eq!(cat.translation, "gato");
    assert_eq!(cat.phonetic, "/kæt/");
    assert_eq!(cat.audio, "https://audio.example/cat.mp3");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let morning = resolver.resolve("GOOD MORNING").await.expect("fixed");
    assert_eq!(morning.translation, "bom dia");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let missing = resolver.resolve("xyzabc").await.expect("placeholder");
    assert_eq!(missing.translation, "Translation not found");
    assert!(missing.audio.ends_with("tl=en&q=xyzabc"));
    resolver.shutdown().await;

    let reopened = WordCache::open(&cache_path, 100, Duration::from_millis(10))
        .await
        .expect("reopen");
    assert_eq!(reopened.len(), 3);
    assert_eq!(reopened.get("cat"), Some(cat));
    assert_eq!(reopened.get("xyzabc"), Some(missing));
    reopened.close().await;
}

#[tokio::test]
async fn resolver_from_settings_without_sources() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fixed_path = dir.path().join("fixed.json");
    std::fs::write(&fixed_path, r#"[{"word": "Thank You", "translation": "obrigado"}]"#)
        .expect("write fixed");

    let settings = Settings {
        fixed_path: Some(fixed_path.to_string_lossy().to_string()),
        cache_path: None,
        dictionary_sources: Vec::new(),
        translation_sources: Vec::new(),
        ..Settings::default()
    };
    let resolver = build_resolver(&settings).await.expect("resolver");
    assert_eq!(resolver.fixed().len(), 1);

    let record = resolver.resolve("thank you").await.expect("record");
    assert_eq!(record.translation, "obrigado");
    assert!(record.audio.contains("q=thank+you"));

    let record = resolver.resolve("dog").await.expect("record");
    insta::assert_json_snapshot!(record, @r###"
    {
      "word": "dog",
      "translation": "Translation not found",
      "phonetic": "",
      "audio": "https://translate.google.com/translate_tts?ie=UTF-8&client=tw-ob&tl=en&q=dog"
    }
    "###);
    assert_eq!(resolver.cache().len(), 2);
    resolver.shutdown().await;
}

#[tokio::test]
async fn one_shot_lookups_print_in_order_and_flush_the_cache() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache_path = dir.path().join("automatic_words.json");
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = WordCache::open(&cache_path, 100, Duration::from_secs(60))
        .await
        .expect("cache");
    let resolver = Arc::new(Resolver::new(
        Arc::new(cache),
        Arc::new(FixedTable::empty()),
        glossary(&calls),
        ResolverOptions::default(),
    ));

    let words = vec!["Cat".to_string(), "   ".to_string(), "xyzabc".to_string()];
    let lines = lookup_lines(&resolver, words).await;
    assert_eq!(lines.len(), 2);
    let first: serde_json::Value = serde_json::from_str(&lines[0]).expect("json");
    let second: serde_json::Value = serde_json::from_str(&lines[1]).expect("json");
    assert_eq!(first["translation"], "gato");
    assert_eq!(second["word"], "xyzabc");

    resolver.shutdown().await;
    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&cache_path).expect("cache file"))
            .expect("json");
    assert_eq!(stored["cat"]["translation"], "gato");
    assert_eq!(stored["xyzabc"]["translation"], "Translation not found");
}
