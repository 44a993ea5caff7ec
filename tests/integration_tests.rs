//! Integration tests for the yaml-assist-lsp engine
//!
//! These tests drive the engine the way the server does, from document
//! text to problems, completions and hovers.

use std::fs;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use proptest::prelude::*;

use yaml_assist_lsp::config::EngineConfig;
use yaml_assist_lsp::diagnostics::{Problem, ProblemKind};
use yaml_assist_lsp::document::{Document, ReconcileState};
use yaml_assist_lsp::engine::{SchemaRegistry, YamlEngine};
use yaml_assist_lsp::parser::{AstKind, AstNode, SNode, StructureTree, YamlAst};
use yaml_assist_lsp::schema::load_dialect_str;
use yaml_assist_lsp::schema::property_index::{
    CancelToken, MetadataFileBuilder, PropertyIndex, PropertyIndexCache, PropertyInfo,
};
use yaml_assist_lsp::text::Region;

const NAME_ONLY: &str = r#"
name: named
files: ['\.named\.ya?ml$']
root: Root
types:
  - name: Root
    kind: bean
    properties:
      - name: name
        type: String
"#;

const SERVER: &str = r#"
name: server
files: ['server\.ya?ml$']
root: Root
types:
  - name: Root
    kind: bean
    properties:
      - name: server
        type: Server
        description: Server settings.
      - name: port
        type: integer
        description: Root port.
  - name: Server
    kind: bean
    properties:
      - name: port
        type: integer
        description: Port the server listens on.
"#;

const DEPLOY: &str = r#"
name: deploy
files: ['deploy\.ya?ml$']
root: Deploy
types:
  - name: Deploy
    kind: bean
    properties:
      - { name: image, type: String }
      - { name: build, type: String }
      - { name: replicas, type: integer }
    constraints:
      - require_one_of: [image, build]
"#;

const WATCH: &str = r#"
name: watch
files: ['watch\.ya?ml$']
root: Root
types:
  - name: Root
    kind: bean
    properties:
      - { name: watch, type: Property }
  - name: Property
    kind: indexed
"#;

fn dialect_file(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yml")
        .tempfile()
        .expect("Failed to create dialect file");
    file.write_all(text.as_bytes()).unwrap();
    file
}

fn engine(dialect: &str) -> YamlEngine {
    YamlEngine::new(
        load_dialect_str(dialect).expect("Failed to load dialect"),
        EngineConfig::default(),
    )
}

fn workflows_engine() -> std::sync::Arc<YamlEngine> {
    SchemaRegistry::load(EngineConfig::default())
        .engine_for("file:///repo/workflow.yaml.tftpl")
        .expect("Workflows dialect should match .yaml.tftpl files")
}

fn kinds(problems: &[Problem]) -> Vec<ProblemKind> {
    problems.iter().map(|p| p.kind).collect()
}

#[test]
fn test_unknown_property_reported_at_key() {
    let problems = engine(NAME_ONLY).reconcile("name: some-name\nblah: hoooo\n");

    assert_eq!(problems.len(), 1, "Expected one problem, got: {:?}", problems);
    assert_eq!(problems[0].region, Region::new(16, 20));
    assert_eq!(problems[0].code(), "unknown-property");
}

#[test]
fn test_empty_document_completes_root_properties() {
    let completions = engine(NAME_ONLY).complete("", 0);

    let labels: Vec<&str> = completions.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["name"]);
}

#[test]
fn test_hover_uses_nested_property() {
    let text = "server:\n  port: 8080\n";
    let offset = text.find("port").unwrap() + 2;

    let hover = engine(SERVER).hover(text, offset).expect("Expected a hover");

    assert!(hover.markdown.contains("Port the server listens on."));
    assert!(!hover.markdown.contains("Root port."));
    assert_eq!(hover.region.text(text), "port");
}

#[test]
fn test_require_one_of_none_found() {
    let problems = engine(DEPLOY).reconcile("replicas: 2\n");
    assert_eq!(kinds(&problems), vec![ProblemKind::MissingRequired]);
}

#[test]
fn test_require_one_of_one_found() {
    let problems = engine(DEPLOY).reconcile("image: nginx\nreplicas: 2\n");
    assert!(problems.is_empty(), "Expected no problems, got: {:?}", problems);
}

#[test]
fn test_require_one_of_two_found() {
    let text = "image: nginx\nbuild: .\n";
    let problems = engine(DEPLOY).reconcile(text);

    assert_eq!(
        kinds(&problems),
        vec![ProblemKind::MutuallyExclusive, ProblemKind::MutuallyExclusive]
    );
    assert_eq!(problems[0].region.text(text), "image");
    assert_eq!(problems[1].region.text(text), "build");
}

#[test]
fn test_syntax_errors_do_not_hide_sibling_problems() {
    let text = "blah: 1\nserver:\n  port: [8080\n";
    let problems = engine(SERVER).reconcile(text);

    assert!(problems.iter().any(|p| p.kind == ProblemKind::SyntaxError));
    let unknown = problems
        .iter()
        .find(|p| p.kind == ProblemKind::UnknownProperty)
        .expect("Expected the unknown sibling to be reported");
    assert_eq!(unknown.region.text(text), "blah");
}

#[test]
fn test_valid_workflow_no_problems() {
    let text = fs::read_to_string("tests/fixtures/valid/workflow.yaml.tftpl")
        .expect("Failed to read fixture");

    let problems = workflows_engine().reconcile(&text);

    assert!(
        problems.is_empty(),
        "Expected no problems for valid workflow, got: {:?}",
        problems
    );
}

#[test]
fn test_unknown_step_keyword() {
    let text = fs::read_to_string("tests/fixtures/invalid/unknown_step_keyword.yaml.tftpl")
        .expect("Failed to read fixture");

    let problems = workflows_engine().reconcile(&text);

    let unknown = problems
        .iter()
        .find(|p| p.kind == ProblemKind::UnknownProperty)
        .expect("Expected an unknown property");
    assert_eq!(unknown.region.text(&text), "calll");
    assert!(problems
        .iter()
        .any(|p| p.kind == ProblemKind::MissingRequired && p.message == "'args' requires 'call'"));
}

#[test]
fn test_workflow_without_main() {
    let text = "helper:\n  steps:\n    - done:\n        return: 1\n";
    let problems = workflows_engine().reconcile(text);

    assert_eq!(problems.len(), 1, "Expected one problem, got: {:?}", problems);
    assert_eq!(problems[0].message, "Workflow must have a 'main' block");
    assert_eq!(problems[0].region.text(text), "helper");
}

#[test]
fn test_step_with_two_actions() {
    let text = "main:\n  steps:\n    - a:\n        call: sys.log\n        return: 1\n";
    let problems = workflows_engine().reconcile(text);

    assert_eq!(
        kinds(&problems),
        vec![ProblemKind::MutuallyExclusive, ProblemKind::MutuallyExclusive]
    );
}

#[test]
fn test_workflow_call_completion() {
    let text = "main:\n  steps:\n    - log:\n        call: sys.l";
    let completions = workflows_engine().complete(text, text.len());

    assert!(
        completions.iter().any(|c| c.label == "sys.log"),
        "Expected sys.log among {:?}",
        completions.iter().map(|c| &c.label).collect::<Vec<_>>()
    );
}

#[test]
fn test_dialect_file_registration() {
    let mut file = tempfile::Builder::new()
        .suffix(".yml")
        .tempfile()
        .expect("Failed to create dialect file");
    file.write_all(DEPLOY.as_bytes()).unwrap();

    let config = EngineConfig {
        dialect_files: vec![file.path().to_path_buf()],
        ..EngineConfig::default()
    };
    let registry = SchemaRegistry::with_dialects(config).expect("Dialects should load");

    assert_eq!(registry.dialect_names(), vec!["gcp-workflows", "deploy"]);
    let engine = registry
        .engine_for("file:///repo/deploy.yaml")
        .expect("Expected the deploy dialect");
    assert_eq!(kinds(&engine.reconcile("replicas: 1\n")), vec![ProblemKind::MissingRequired]);
}

#[test]
fn test_broken_dialect_file_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create dialect file");
    file.write_all(b"name: broken\nroot: Missing\n").unwrap();

    let config = EngineConfig {
        dialect_files: vec![file.path().to_path_buf()],
        ..EngineConfig::default()
    };
    assert_matches!(SchemaRegistry::with_dialects(config.clone()), Err(_));
    assert_eq!(SchemaRegistry::load(config).dialect_names(), vec!["gcp-workflows"]);
}

#[test]
fn test_indexed_type_drives_completion() {
    let file = dialect_file(WATCH);
    let config = EngineConfig {
        dialect_files: vec![file.path().to_path_buf()],
        ..EngineConfig::default()
    };
    let index: PropertyIndex = [
        ("server.port".to_string(), PropertyInfo::default()),
        (
            "server.old".to_string(),
            PropertyInfo {
                deprecation: Some("Use server.port".to_string()),
                ..PropertyInfo::default()
            },
        ),
    ]
    .into_iter()
    .collect();
    let registry = SchemaRegistry::new(config)
        .with_property_index(Arc::new(index))
        .try_load_dialects()
        .expect("Dialects should load");
    let engine = registry
        .engine_for("file:///repo/watch.yaml")
        .expect("Expected the watch dialect");

    let text = "watch: s";
    let labels: Vec<String> = engine
        .complete(text, text.len())
        .into_iter()
        .map(|c| c.label)
        .collect();
    assert_eq!(labels, vec!["server.port"]);

    let text = "watch: server.host\n";
    let problems = engine.reconcile(text);
    assert_eq!(problems.len(), 1, "Expected one problem, got: {:?}", problems);
    assert_eq!(problems[0].region.text(text), "server.host");
    assert_eq!(kinds(&engine.reconcile("watch: server.old\n")), vec![ProblemKind::Deprecated]);
}

#[tokio::test]
async fn test_indexed_type_reads_cache_snapshot() {
    let mut metadata = tempfile::NamedTempFile::new().expect("Failed to create metadata file");
    metadata
        .write_all(br#"{"properties": [{"name": "server.port", "description": "Server HTTP port."}]}"#)
        .unwrap();
    let key = metadata.path().to_string_lossy().into_owned();
    let file = dialect_file(WATCH);
    let config = EngineConfig {
        dialect_files: vec![file.path().to_path_buf()],
        ..EngineConfig::default()
    };

    let cache = Arc::new(PropertyIndexCache::new(MetadataFileBuilder, Duration::from_secs(60)));
    let registry = SchemaRegistry::new(config)
        .with_property_index(Arc::new(cache.lookup_for(&key)))
        .load_dialects();
    let engine = registry
        .engine_for("file:///repo/watch.yaml")
        .expect("Expected the watch dialect");

    // before the build the type accepts anything and suggests nothing
    assert!(engine.reconcile("watch: anything\n").is_empty());
    assert!(engine.complete("watch: s", 8).is_empty());

    cache
        .get_or_build(&key, &CancelToken::new())
        .await
        .expect("Metadata should build");
    let completions = engine.complete("watch: s", 8);
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].label, "server.port");
    assert_eq!(kinds(&engine.reconcile("watch: anything\n")), vec![ProblemKind::InvalidValue]);
}

#[test]
fn test_document_discards_stale_reconcile() {
    let mut doc = Document::new("image: a\n".to_string(), 1);
    let first = doc.begin_reconcile().expect("New documents need a reconcile");

    doc.update("image: b\n".to_string(), 2);
    assert!(!doc.finish_reconcile(first.generation));
    assert_eq!(doc.state(), ReconcileState::Dirty);

    let second = doc.begin_reconcile().expect("Edited documents need a reconcile");
    assert_eq!(second.text, "image: b\n");
    assert!(doc.finish_reconcile(second.generation));
    assert_eq!(doc.state(), ReconcileState::Clean);
}

fn check_containment(node: SNode<'_>) {
    let region = node.tree_region();
    if !region.is_empty() {
        assert!(node.contains(region.start));
        assert!(node.contains(region.end - 1));
    }
    assert!(!node.contains(region.end));

    let children: Vec<SNode<'_>> = node.children().collect();
    for child in &children {
        assert!(
            region.encloses(&child.tree_region()),
            "{} does not enclose {}",
            region,
            child.tree_region()
        );
        check_containment(*child);
    }
    for pair in children.windows(2) {
        assert!(pair[0].tree_end() <= pair[1].start());
    }
}

fn check_ast_nesting(text: &str, node: &AstNode) {
    assert!(text.is_char_boundary(node.region.start) && text.is_char_boundary(node.region.end));
    let children: Vec<&AstNode> = match &node.kind {
        AstKind::Scalar(_) => Vec::new(),
        AstKind::Mapping(entries) => entries.iter().flat_map(|e| [&e.key, &e.value]).collect(),
        AstKind::Sequence(items) => items.iter().collect(),
    };
    for child in &children {
        assert!(
            node.region.encloses(&child.region),
            "{} does not enclose {} in {:?}",
            node.region,
            child.region,
            text
        );
        check_ast_nesting(text, child);
    }
    // an offset at a node's end belongs to what follows it
    for pair in children.windows(2) {
        assert!(pair[0].region.end <= pair[1].region.start, "siblings overlap in {:?}", text);
    }
}

proptest! {
    #[test]
    fn prop_structure_spans_whole_text(text in "\\PC*") {
        let tree = StructureTree::parse(&text);
        prop_assert_eq!(tree.root().tree_region(), Region::new(0, text.len()));
    }

    #[test]
    fn prop_structure_nodes_nest(text in "[a-z:# \\-\n]{0,120}") {
        let tree = StructureTree::parse(&text);
        check_containment(tree.root());

        for offset in 0..text.len() {
            let node = tree.find(offset).expect("The root contains every offset");
            prop_assert!(node.contains(offset));
            prop_assert!(node.children().all(|child| !child.contains(offset)));
        }
    }

    #[test]
    fn prop_ast_paths_nest(text in "[a-cé日: \\-\\[\\]{},\n]{0,60}") {
        let ast = YamlAst::parse(&text);
        for document in ast.documents() {
            check_ast_nesting(&text, &document.root);
        }
        for error in ast.syntax_errors() {
            prop_assert!(text.is_char_boundary(error.region.start));
        }

        for offset in (0..=text.len()).filter(|o| text.is_char_boundary(*o)) {
            let path = ast.find_path(offset);
            for node in &path {
                prop_assert!(node.contains(offset), "{} not in {}", offset, node.region);
            }
            for pair in path.windows(2) {
                prop_assert!(pair[0].region.encloses(&pair[1].region));
            }
        }
    }
}
