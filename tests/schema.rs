use yangrs::context::{Context, ContextFlags};
use yangrs::schema::diff::{schema_diff, SchemaChangeKind};
use yangrs::schema::{
    DataValueType, SchemaInputFormat, SchemaNodeKind, SchemaOutputFormat,
    SchemaPathFormat, SchemaPrinterFlags,
};
use yangrs::ErrorCode;

static SEARCH_DIR: &str = "./assets/yang/";

fn create_context() -> Context {
    // Initialize context.
    let mut ctx = Context::new(ContextFlags::NO_YANGLIBRARY)
        .expect("Failed to create context");
    ctx.set_searchdir(SEARCH_DIR)
        .expect("Failed to set YANG search directory");

    // Load YANG modules.
    for module_name in &["ietf-interfaces", "iana-if-type"] {
        ctx.load_module(module_name, None, &[])
            .expect("Failed to load module");
    }

    ctx
}

fn paths<'a>(snodes: impl Iterator<Item = yangrs::schema::SchemaNode<'a>>) -> Vec<String> {
    snodes
        .map(|snode| snode.path(SchemaPathFormat::DATA))
        .collect()
}

#[test]
fn schema_find_xpath() {
    let ctx = create_context();

    assert_eq!(
        paths(
            ctx.find_xpath("/ietf-interfaces:interfaces/*")
                .expect("Failed to lookup schema data")
                .into_iter()
        ),
        vec!["/ietf-interfaces:interfaces/interface"]
    );

    assert_eq!(
        paths(
            ctx.find_xpath("/ietf-interfaces:interfaces/interface/*")
                .expect("Failed to lookup schema data")
                .into_iter()
        ),
        vec![
            "/ietf-interfaces:interfaces/interface/name",
            "/ietf-interfaces:interfaces/interface/description",
            "/ietf-interfaces:interfaces/interface/type",
            "/ietf-interfaces:interfaces/interface/enabled",
            "/ietf-interfaces:interfaces/interface/oper-status",
            "/ietf-interfaces:interfaces/interface/last-change",
            "/ietf-interfaces:interfaces/interface/phys-address",
            "/ietf-interfaces:interfaces/interface/higher-layer-if",
            "/ietf-interfaces:interfaces/interface/lower-layer-if",
            "/ietf-interfaces:interfaces/interface/speed",
            "/ietf-interfaces:interfaces/interface/statistics",
        ]
    );
}

#[test]
fn schema_find_path() {
    let ctx = create_context();

    assert!(ctx
        .find_path("/ietf-interfaces:interfaces/interface/*")
        .is_err());
    assert!(ctx
        .find_path("/ietf-interfaces:interfaces/interface")
        .is_ok());
    assert!(ctx
        .find_path("/ietf-interfaces:interfaces/interface/if-index")
        .is_err());
}

#[test]
fn schema_iterator_traverse() {
    let ctx = create_context();
    let snode_top = ctx.traverse().next().unwrap();

    assert_eq!(
        paths(snode_top.traverse()),
        vec![
            "/ietf-interfaces:interfaces",
            "/ietf-interfaces:interfaces/interface",
            "/ietf-interfaces:interfaces/interface/name",
            "/ietf-interfaces:interfaces/interface/description",
            "/ietf-interfaces:interfaces/interface/type",
            "/ietf-interfaces:interfaces/interface/enabled",
            "/ietf-interfaces:interfaces/interface/oper-status",
            "/ietf-interfaces:interfaces/interface/last-change",
            "/ietf-interfaces:interfaces/interface/phys-address",
            "/ietf-interfaces:interfaces/interface/higher-layer-if",
            "/ietf-interfaces:interfaces/interface/lower-layer-if",
            "/ietf-interfaces:interfaces/interface/speed",
            "/ietf-interfaces:interfaces/interface/statistics",
            "/ietf-interfaces:interfaces/interface/statistics/discontinuity-time",
            "/ietf-interfaces:interfaces/interface/statistics/in-octets",
            "/ietf-interfaces:interfaces/interface/statistics/in-unicast-pkts",
            "/ietf-interfaces:interfaces/interface/statistics/in-broadcast-pkts",
            "/ietf-interfaces:interfaces/interface/statistics/in-multicast-pkts",
            "/ietf-interfaces:interfaces/interface/statistics/in-discards",
            "/ietf-interfaces:interfaces/interface/statistics/in-errors",
            "/ietf-interfaces:interfaces/interface/statistics/in-unknown-protos",
            "/ietf-interfaces:interfaces/interface/statistics/out-octets",
            "/ietf-interfaces:interfaces/interface/statistics/out-unicast-pkts",
            "/ietf-interfaces:interfaces/interface/statistics/out-broadcast-pkts",
            "/ietf-interfaces:interfaces/interface/statistics/out-multicast-pkts",
            "/ietf-interfaces:interfaces/interface/statistics/out-discards",
            "/ietf-interfaces:interfaces/interface/statistics/out-errors",
        ]
    );
}

#[test]
fn schema_iterator_ancestors() {
    let ctx = create_context();

    assert_eq!(
        paths(
            ctx.find_path("/ietf-interfaces:interfaces/interface/statistics/discontinuity-time")
                .expect("Failed to lookup schema data")
                .ancestors()
        ),
        vec![
            "/ietf-interfaces:interfaces/interface/statistics",
            "/ietf-interfaces:interfaces/interface",
            "/ietf-interfaces:interfaces",
        ]
    );
}

#[test]
fn schema_iterator_siblings() {
    let ctx = create_context();

    assert_eq!(
        paths(
            ctx.find_path("/ietf-interfaces:interfaces/interface/name")
                .expect("Failed to lookup schema data")
                .siblings()
        ),
        vec![
            "/ietf-interfaces:interfaces/interface/description",
            "/ietf-interfaces:interfaces/interface/type",
            "/ietf-interfaces:interfaces/interface/enabled",
            "/ietf-interfaces:interfaces/interface/oper-status",
            "/ietf-interfaces:interfaces/interface/last-change",
            "/ietf-interfaces:interfaces/interface/phys-address",
            "/ietf-interfaces:interfaces/interface/higher-layer-if",
            "/ietf-interfaces:interfaces/interface/lower-layer-if",
            "/ietf-interfaces:interfaces/interface/speed",
            "/ietf-interfaces:interfaces/interface/statistics",
        ]
    );
}

#[test]
fn schema_iterator_children() {
    let ctx = create_context();

    assert_eq!(
        paths(
            ctx.find_path("/ietf-interfaces:interfaces/interface/statistics")
                .expect("Failed to lookup schema data")
                .children()
        ),
        vec![
            "/ietf-interfaces:interfaces/interface/statistics/discontinuity-time",
            "/ietf-interfaces:interfaces/interface/statistics/in-octets",
            "/ietf-interfaces:interfaces/interface/statistics/in-unicast-pkts",
            "/ietf-interfaces:interfaces/interface/statistics/in-broadcast-pkts",
            "/ietf-interfaces:interfaces/interface/statistics/in-multicast-pkts",
            "/ietf-interfaces:interfaces/interface/statistics/in-discards",
            "/ietf-interfaces:interfaces/interface/statistics/in-errors",
            "/ietf-interfaces:interfaces/interface/statistics/in-unknown-protos",
            "/ietf-interfaces:interfaces/interface/statistics/out-octets",
            "/ietf-interfaces:interfaces/interface/statistics/out-unicast-pkts",
            "/ietf-interfaces:interfaces/interface/statistics/out-broadcast-pkts",
            "/ietf-interfaces:interfaces/interface/statistics/out-multicast-pkts",
            "/ietf-interfaces:interfaces/interface/statistics/out-discards",
            "/ietf-interfaces:interfaces/interface/statistics/out-errors",
        ]
    );
}

#[test]
fn schema_node_attributes() {
    let ctx = create_context();

    let snode = ctx
        .find_path("/ietf-interfaces:interfaces/interface/enabled")
        .expect("Failed to lookup schema node");
    assert_eq!(snode.kind(), SchemaNodeKind::Leaf);
    assert_eq!(snode.name(), "enabled");
    assert!(snode.description().is_some());
    assert!(snode.reference().is_some());
    assert!(snode.is_config());
    assert!(!snode.is_mandatory());
    assert_eq!(snode.default_value_canonical(), Some("true"));
    assert_eq!(
        snode.leaf_type().map(|ty| ty.base_type()),
        Some(DataValueType::Bool)
    );
    assert!(snode.units().is_none());
    assert!(snode.musts().next().is_none());
    assert!(snode.whens().next().is_none());

    let snode = ctx
        .find_path("/ietf-interfaces:interfaces/interface")
        .expect("Failed to lookup schema node");
    assert_eq!(snode.kind(), SchemaNodeKind::List);
    assert_eq!(snode.name(), "interface");
    assert!(snode.description().is_some());
    assert!(snode.reference().is_none());
    assert!(snode.is_config());
    assert!(!snode.is_mandatory());
    assert!(!snode.is_keyless_list());
    assert!(!snode.is_user_ordered());
    assert_eq!(snode.min_elements(), None);
    assert_eq!(snode.max_elements(), None);
    assert_eq!(
        snode.list_keys().map(|key| key.name()).collect::<Vec<_>>(),
        vec!["name"]
    );
    assert!(snode.musts().next().is_none());
    assert!(snode.whens().next().is_none());
    assert!(snode.actions().next().is_none());
    assert!(snode.notifications().next().is_none());

    let snode = ctx
        .find_path("/ietf-interfaces:interfaces/interface/speed")
        .expect("Failed to lookup schema node");
    assert!(snode.is_state());
    assert_eq!(snode.units(), Some("bits/second"));
    let ty = snode.leaf_type().expect("Missing leaf type");
    assert_eq!(ty.base_type(), DataValueType::Uint64);
    assert_eq!(ty.typedef_name().as_deref(), Some("gauge64"));

    let snode = ctx
        .find_path("/ietf-interfaces:interfaces/interface/higher-layer-if")
        .expect("Failed to lookup schema node");
    let ty = snode.leaf_type().expect("Missing leaf type");
    assert_eq!(ty.base_type(), DataValueType::LeafRef);
    assert_eq!(
        ty.leafref_path(),
        Some("/if:interfaces/if:interface/if:name")
    );
    assert_eq!(
        ty.leafref_real_type().map(|ty| ty.base_type()),
        Some(DataValueType::String)
    );
}

#[test]
fn schema_module_metadata() {
    let ctx = create_context();
    let module = ctx
        .get_module_latest("ietf-interfaces")
        .expect("Failed to lookup module");

    assert_eq!(module.name(), "ietf-interfaces");
    assert_eq!(module.revision(), Some("2018-02-20"));
    assert_eq!(module.prefix(), "if");
    assert_eq!(
        module.namespace(),
        "urn:ietf:params:xml:ns:yang:ietf-interfaces"
    );
    assert!(module.is_implemented());
    assert_eq!(module.revisions(), vec!["2018-02-20", "2014-05-08"]);
    assert_eq!(
        module
            .imports()
            .map(|import| (import.prefix(), import.module().name()))
            .collect::<Vec<_>>(),
        vec![("yang", "ietf-yang-types")]
    );
    assert_eq!(
        module.features().collect::<Vec<_>>(),
        vec![
            ("arbitrary-names", false),
            ("pre-provisioning", false),
            ("if-mib", false)
        ]
    );

    let iana = ctx
        .get_module_latest("iana-if-type")
        .expect("Failed to lookup module");
    let ethernet = iana
        .identities()
        .find(|identity| identity.name() == "ethernetCsmacd")
        .expect("Failed to lookup identity");
    let base = module
        .identities()
        .find(|identity| identity.name() == "interface-type")
        .expect("Failed to lookup identity");
    assert!(ethernet.is_derived_from(&base));
}

#[test]
fn schema_feature_gating() {
    let mut ctx = create_context();
    assert!(ctx
        .find_path("/ietf-interfaces:interfaces/interface/if-index")
        .is_err());

    ctx.feature_enable("ietf-interfaces", "if-mib")
        .expect("Failed to enable feature");
    assert!(ctx.needs_recompile());
    let error = ctx
        .find_path("/ietf-interfaces:interfaces/interface")
        .expect_err("Stale schema used");
    assert_eq!(error.errcode, ErrorCode::Recompile);

    ctx.compile().expect("Failed to compile schema");
    assert_eq!(ctx.feature_value("ietf-interfaces", "if-mib"), Ok(true));
    assert!(ctx
        .find_path("/ietf-interfaces:interfaces/interface/if-index")
        .is_ok());
    assert!(ctx
        .find_path("/ietf-interfaces:interfaces/interface/admin-status")
        .is_ok());

    ctx.feature_disable("ietf-interfaces", "if-mib")
        .expect("Failed to disable feature");
    ctx.compile().expect("Failed to compile schema");
    assert!(ctx
        .find_path("/ietf-interfaces:interfaces/interface/if-index")
        .is_err());
}

#[test]
fn schema_augment_and_deviation() {
    let mut ctx = create_context();
    ctx.load_module("example-augment", None, &[])
        .expect("Failed to load module");

    let location = ctx
        .find_path("/example:system/example-augment:location")
        .expect("Failed to lookup augmented node");
    assert_eq!(location.module().name(), "example-augment");
    assert_eq!(
        location.path(SchemaPathFormat::DATA),
        "/example:system/example-augment:location"
    );

    // The augmented module is implemented as a dependency.
    assert!(ctx
        .get_module_latest("example")
        .is_some_and(|module| module.is_implemented()));

    let hostname = ctx
        .find_path("/example:system/hostname")
        .expect("Failed to lookup schema node");
    assert_eq!(hostname.default_value_canonical(), Some("router"));
}

#[test]
fn schema_compile_is_deterministic() {
    let mut ctx = create_context();
    let other = create_context();
    let before = paths(ctx.traverse());
    assert_eq!(paths(other.traverse()), before);

    ctx.compile().expect("Failed to compile schema");
    assert_eq!(paths(ctx.traverse()), before);
}

#[test]
fn schema_invalid_modules() {
    let mut ctx = create_context();

    // Syntax error.
    assert!(ctx
        .parse_module_str(
            "module broken { namespace urn:broken; prefix b; leaf x {",
            SchemaInputFormat::YANG,
            &[],
        )
        .is_err());

    // Unresolved typedef.
    assert!(ctx
        .parse_module_str(
            "module broken { namespace urn:broken; prefix b; \
             leaf x { type no-such-type; } }",
            SchemaInputFormat::YANG,
            &[],
        )
        .is_err());

    // Failed loads leave the context usable.
    assert!(ctx.get_module_latest("broken").is_none());
    assert!(ctx
        .find_path("/ietf-interfaces:interfaces/interface")
        .is_ok());
}

#[test]
fn schema_print_yang_roundtrip() {
    let mut ctx = Context::new(ContextFlags::NO_YANGLIBRARY)
        .expect("Failed to create context");
    ctx.set_searchdir(SEARCH_DIR)
        .expect("Failed to set YANG search directory");
    ctx.load_module("example", None, &[])
        .expect("Failed to load module");
    let yang = ctx
        .get_module_latest("example")
        .expect("Failed to lookup module")
        .print_string(SchemaOutputFormat::YANG, SchemaPrinterFlags::empty())
        .expect("Failed to print module");
    let yin = ctx
        .get_module_latest("example")
        .expect("Failed to lookup module")
        .print_string(SchemaOutputFormat::YIN, SchemaPrinterFlags::empty())
        .expect("Failed to print module");
    assert!(yin.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<module name=\"example\""));

    // The printed module loads into a fresh context with the same schema.
    for (text, format) in [(yang, SchemaInputFormat::YANG), (yin, SchemaInputFormat::YIN)] {
        let mut ctx2 = Context::new(ContextFlags::NO_YANGLIBRARY)
            .expect("Failed to create context");
        ctx2.parse_module_str(&text, format, &[])
            .expect("Failed to parse printed module");
        assert_eq!(paths(ctx2.traverse()), paths(ctx.traverse()));
    }
}

#[test]
fn schema_print_tree() {
    let mut ctx = Context::new(ContextFlags::NO_YANGLIBRARY)
        .expect("Failed to create context");
    ctx.set_searchdir(SEARCH_DIR)
        .expect("Failed to set YANG search directory");
    ctx.load_module("example", None, &[])
        .expect("Failed to load module");
    let tree = ctx
        .get_module_latest("example")
        .expect("Failed to lookup module")
        .print_string(SchemaOutputFormat::TREE, SchemaPrinterFlags::empty())
        .expect("Failed to print module");

    assert!(tree.starts_with("module: example\n"));
    assert!(tree.contains("  +--rw top\n"));
    assert!(tree.contains("|  +--rw item* [id]\n"));
    assert!(tree.contains("+--rw (transport)?\n"));
    assert!(tree.contains("+--rw logging!\n"));
    assert!(tree.contains("+---x reboot\n"));
    assert!(tree.contains("\n  rpcs:\n    +---x ping\n"));
    assert!(tree.contains("\n  notifications:\n    +---n alarm\n"));
}

#[test]
fn schema_diff_between_contexts() {
    let old_source = r#"module yolo {
        namespace "urn:yolo";
        prefix y;
        container conf {
            leaf speed {
                type uint32;
            }
            leaf legacy {
                type string;
            }
            leaf proto {
                type enumeration {
                    enum http;
                    enum ftp;
                }
            }
        }
    }"#;
    let new_source = r#"module yolo {
        namespace "urn:yolo";
        prefix y;
        container conf {
            leaf speed {
                type uint64;
                default "100";
            }
            leaf proto {
                type enumeration {
                    enum http;
                }
                status deprecated;
            }
            leaf enabled {
                type boolean;
            }
            container internal {
                leaf debug {
                    type boolean;
                }
            }
        }
    }"#;
    let mut old_ctx = Context::new(ContextFlags::NO_YANGLIBRARY)
        .expect("Failed to create context");
    old_ctx
        .parse_module_str(old_source, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");
    let mut new_ctx = Context::new(ContextFlags::NO_YANGLIBRARY)
        .expect("Failed to create context");
    new_ctx
        .parse_module_str(new_source, SchemaInputFormat::YANG, &[])
        .expect("Failed to parse module");

    let changes = schema_diff(&old_ctx, &new_ctx, |snode| snode.name() == "internal");
    let printed = changes
        .iter()
        .map(|change| change.to_string())
        .collect::<Vec<_>>();
    assert_eq!(
        printed,
        vec![
            "+/yolo:conf/enabled: added node",
            "-/yolo:conf/legacy: removed status=current node",
            "*/yolo:conf/proto: status \"current\" -> \"deprecated\"",
            "-/yolo:conf/proto: enum \"ftp\"",
            "-/yolo:conf/speed: base-type \"uint32\"",
            "+/yolo:conf/speed: base-type \"uint64\"",
            "*/yolo:conf/speed: default \"\" -> \"100\"",
        ]
    );
    assert!(changes
        .iter()
        .all(|change| change.kind != SchemaChangeKind::NodeAdded
            || !change.path.contains("internal")));
}

#[test]
fn schema_leafref_targets_implemented() {
    let mut ctx = Context::new(
        ContextFlags::NO_YANGLIBRARY | ContextFlags::REF_IMPLEMENTED,
    )
    .expect("Failed to create context");
    ctx.set_searchdir(SEARCH_DIR)
        .expect("Failed to set YANG search directory");
    ctx.parse_module_str(
        r#"module uplinks {
            namespace "urn:uplinks";
            prefix u;
            import ietf-interfaces {
                prefix if;
            }
            leaf uplink {
                type leafref {
                    path "/if:interfaces/if:interface/if:name";
                }
            }
        }"#,
        SchemaInputFormat::YANG,
        &[],
    )
    .expect("Failed to parse module");

    assert!(ctx
        .get_module_latest("ietf-interfaces")
        .is_some_and(|module| module.is_implemented()));
    let snode = ctx
        .find_path("/uplinks:uplink")
        .expect("Failed to lookup schema node");
    assert_eq!(
        snode
            .leaf_type()
            .and_then(|ty| ty.leafref_real_type())
            .map(|ty| ty.base_type()),
        Some(DataValueType::String)
    );
}
