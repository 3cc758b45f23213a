use yangrs::context::{Context, ContextFlags};
use yangrs::data::{
    Data, DataDiffFlags, DataFormat, DataOperation, DataParserFlags,
    DataPrinterFlags, DataTree, DataValidationFlags, ValidationState,
};
use yangrs::schema::{DataValue, SchemaInputFormat};
use yangrs::xpath::{PrefixFormat, XPathValue};
use yangrs::{ErrorCode, ValidationErrorCode};

static SEARCH_DIR: &str = "./assets/yang/";

fn create_context() -> Context {
    let mut ctx = Context::new(ContextFlags::NO_YANGLIBRARY)
        .expect("Failed to create context");
    ctx.set_searchdir(SEARCH_DIR)
        .expect("Failed to set YANG search directory");
    ctx.load_module("example", None, &[])
        .expect("Failed to load module");
    ctx
}

fn parse<'a>(ctx: &'a Context, json: &str) -> yangrs::Result<DataTree<'a>> {
    DataTree::parse_string(
        ctx,
        json,
        DataFormat::JSON,
        DataParserFlags::empty(),
        DataValidationFlags::PRESENT,
    )
}

fn inline_context(modules: &[&str]) -> Context {
    let mut ctx = Context::new(ContextFlags::NO_YANGLIBRARY)
        .expect("Failed to create context");
    for module in modules {
        ctx.parse_module_str(module, SchemaInputFormat::YANG, &[])
            .expect("Failed to parse module");
    }
    ctx
}

fn print(dtree: &DataTree<'_>, format: DataFormat) -> String {
    dtree
        .print_string(format, DataPrinterFlags::WITH_SIBLINGS)
        .expect("Failed to print data")
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

#[test]
fn container_leaf_and_list() {
    let ctx = create_context();
    let input = r#"{"example:top":{"name":"x","item":[{"id":1}]}}"#;
    let dtree = parse(&ctx, input).expect("Failed to parse data tree");

    let top = dtree
        .find_path("/example:top")
        .expect("Failed to lookup data");
    assert_eq!(top.children().count(), 2);
    let name = dtree
        .find_path("/example:top/name")
        .expect("Failed to lookup data");
    assert_eq!(name.value_canonical().as_deref(), Some("x"));
    let items = dtree
        .find_xpath("/example:top/item")
        .expect("Failed to lookup data")
        .collect::<Vec<_>>();
    assert_eq!(items.len(), 1);
    let id = dtree
        .find_path("/example:top/item[id='1']/id")
        .expect("Failed to lookup data");
    assert_eq!(id.value(), Some(DataValue::Uint32(1)));

    assert_eq!(strip_whitespace(&print(&dtree, DataFormat::JSON)), input);
}

#[test]
fn leafref_without_target() {
    let ctx = create_context();
    let error = parse(&ctx, r#"{"example:refs":{"ref":"abc"}}"#)
        .expect_err("Dangling leafref accepted");
    assert_eq!(error.errcode, ErrorCode::Valid);
    assert_eq!(error.vecode, ValidationErrorCode::Reference);
    assert_eq!(error.apptag.as_deref(), Some("instance-required"));
    assert_eq!(error.path.as_deref(), Some("/example:refs/ref"));

    parse(&ctx, r#"{"example:refs":{"other":"abc","ref":"abc"}}"#)
        .expect("Failed to parse data tree");
}

#[test]
fn grouping_when_evaluated_per_use() {
    let ctx = create_context();

    let primary = ctx
        .find_path("/example:primary/address")
        .expect("Failed to lookup schema node");
    let backup = ctx
        .find_path("/example:backup/address")
        .expect("Failed to lookup schema node");
    let primary_when = primary.whens().next().expect("Missing when");
    let backup_when = backup.whens().next().expect("Missing when");
    assert_eq!(primary_when.condition(), "../mode = 'static'");
    assert!(primary_when.shares_condition(&backup_when));

    // The default mode is static in both containers.
    let dtree = parse(
        &ctx,
        r#"{
            "example:primary": {"address": "10.0.0.1"},
            "example:backup": {"address": "10.0.0.2"}
        }"#,
    )
    .expect("Failed to parse data tree");
    assert!(dtree.find_path("/example:backup/address").is_ok());

    // Only the backup condition is false.
    let error = parse(
        &ctx,
        r#"{
            "example:primary": {"address": "10.0.0.1"},
            "example:backup": {"mode": "dhcp", "address": "10.0.0.2"}
        }"#,
    )
    .expect_err("False when condition accepted");
    assert_eq!(error.errcode, ErrorCode::Valid);
    assert_eq!(error.path.as_deref(), Some("/example:backup/address"));
}

#[test]
fn when_false_removes_edited_node() {
    let ctx = create_context();
    let mut dtree = DataTree::new(&ctx);
    dtree
        .new_path("/example:backup/mode", Some("dhcp"), false)
        .expect("Failed to edit data tree");
    dtree
        .new_path("/example:backup/address", Some("10.0.0.2"), false)
        .expect("Failed to edit data tree");
    dtree
        .validate(DataValidationFlags::PRESENT)
        .expect("Failed to validate data tree");
    assert!(dtree.find_path("/example:backup/address").is_err());
}

#[test]
fn implicit_defaults() {
    let ctx = create_context();
    let dtree = parse(&ctx, r#"{"example:system":{"mtu":1500}}"#)
        .expect("Failed to parse data tree");

    let hostname = dtree
        .find_path("/example:system/hostname")
        .expect("Failed to lookup data");
    assert!(hostname.is_default());
    assert_eq!(hostname.value_canonical().as_deref(), Some("localhost"));

    // Default case of the choice.
    let port = dtree
        .find_path("/example:system/tcp-port")
        .expect("Failed to lookup data");
    assert!(port.is_default());
    assert_eq!(port.value(), Some(DataValue::Uint16(22)));

    // Defaults are not printed in the explicit mode.
    assert_eq!(
        strip_whitespace(&print(&dtree, DataFormat::JSON)),
        r#"{"example:system":{"mtu":1500}}"#
    );
    let all = dtree
        .print_string(
            DataFormat::JSON,
            DataPrinterFlags::WITH_SIBLINGS | DataPrinterFlags::WD_ALL,
        )
        .expect("Failed to print data");
    assert!(all.contains("\"hostname\": \"localhost\""));
}

#[test]
fn choice_cases_exclusive() {
    let ctx = create_context();
    let error = parse(
        &ctx,
        r#"{"example:system":{"tcp-port":80,"udp-port":53}}"#,
    )
    .expect_err("Data for both cases accepted");
    assert_eq!(error.errcode, ErrorCode::Valid);

    let dtree = parse(&ctx, r#"{"example:system":{"udp-port":53}}"#)
        .expect("Failed to parse data tree");
    assert!(dtree.find_path("/example:system/tcp-port").is_err());
}

#[test]
fn must_violation() {
    let ctx = create_context();
    let error = parse(&ctx, r#"{"example:system":{"mtu":576}}"#)
        .expect_err("Must violation accepted");
    assert_eq!(error.errcode, ErrorCode::Valid);
    assert_eq!(error.msg.as_deref(), Some("MTU too small for IPv6."));
    assert_eq!(error.apptag.as_deref(), Some("mtu-too-small"));

    parse(&ctx, r#"{"example:system":{"mtu":576,"ipv4-only":true}}"#)
        .expect("Failed to parse data tree");
}

#[test]
fn type_restrictions() {
    let ctx = create_context();
    assert!(parse(&ctx, r#"{"example:system":{"mtu":20}}"#).is_err());
    assert!(parse(&ctx, r#"{"example:system":{"hostname":""}}"#).is_err());
    assert!(parse(&ctx, r#"{"example:top":{"item":[{"id":-1}]}}"#).is_err());
}

#[test]
fn unique_and_max_elements() {
    let ctx = create_context();
    let error = parse(
        &ctx,
        r#"{"example:system":{"user":[
            {"name":"alice","uid":1000},
            {"name":"bob","uid":1000}
        ]}}"#,
    )
    .expect_err("Unique violation accepted");
    assert_eq!(error.apptag.as_deref(), Some("data-not-unique"));

    let error = parse(
        &ctx,
        r#"{"example:system":{"dns":["a","b","c","d"]}}"#,
    )
    .expect_err("Too many elements accepted");
    assert_eq!(error.apptag.as_deref(), Some("too-many-elements"));
}

#[test]
fn presence_container_mandatory_child() {
    let ctx = create_context();
    assert!(parse(&ctx, r#"{"example:system":{"logging":{}}}"#).is_err());
    parse(&ctx, r#"{"example:system":{"logging":{"level":3}}}"#)
        .expect("Failed to parse data tree");
}

#[test]
fn disabled_feature_rejects_data() {
    let ctx = create_context();
    let result = DataTree::parse_string(
        &ctx,
        r#"{"example:system":{"extra-option":"on"}}"#,
        DataFormat::JSON,
        DataParserFlags::STRICT,
        DataValidationFlags::PRESENT,
    );
    assert!(result.is_err());
}

#[test]
fn validation_is_idempotent() {
    let ctx = create_context();
    let mut dtree = parse(
        &ctx,
        r#"{"example:system":{"mtu":1500,"dns":["b","a"]}}"#,
    )
    .expect("Failed to parse data tree");
    assert!(dtree
        .traverse()
        .all(|dnode| dnode.validation_state() == ValidationState::Clean));
    let before = dtree
        .print_string(
            DataFormat::JSON,
            DataPrinterFlags::WITH_SIBLINGS | DataPrinterFlags::WD_ALL,
        )
        .expect("Failed to print data");

    dtree
        .validate(DataValidationFlags::PRESENT)
        .expect("Failed to validate data tree");
    let after = dtree
        .print_string(
            DataFormat::JSON,
            DataPrinterFlags::WITH_SIBLINGS | DataPrinterFlags::WD_ALL,
        )
        .expect("Failed to print data");
    assert_eq!(before, after);
}

#[test]
fn json_xml_roundtrip() {
    let ctx = create_context();
    let dtree = parse(
        &ctx,
        r#"{
            "example:top": {"name": "x", "item": [{"id": 1}, {"id": 2}]},
            "example:system": {
                "mtu": 1500,
                "dns": ["b", "a"],
                "user": [{"name": "bob", "uid": 1}, {"name": "alice", "uid": 2}]
            }
        }"#,
    )
    .expect("Failed to parse data tree");

    let xml = print(&dtree, DataFormat::XML);
    let dtree2 = DataTree::parse_string(
        &ctx,
        &xml,
        DataFormat::XML,
        DataParserFlags::empty(),
        DataValidationFlags::PRESENT,
    )
    .expect("Failed to parse data tree");
    assert_eq!(print(&dtree, DataFormat::JSON), print(&dtree2, DataFormat::JSON));
}

#[test]
fn diff_apply_user_ordered() {
    let ctx = create_context();
    let mut dtree1 = parse(
        &ctx,
        r#"{"example:system":{
            "dns":["a","b","c"],
            "user":[{"name":"alice"},{"name":"bob"},{"name":"carol"}]
        }}"#,
    )
    .expect("Failed to parse data tree");
    let dtree2 = parse(
        &ctx,
        r#"{"example:system":{
            "dns":["c","a","d"],
            "user":[{"name":"carol"},{"name":"dave"},{"name":"alice"}]
        }}"#,
    )
    .expect("Failed to parse data tree");

    let diff = dtree1
        .diff(&dtree2, DataDiffFlags::empty())
        .expect("Failed to compare data trees");
    dtree1.diff_apply(&diff).expect("Failed to apply diff");
    assert_eq!(print(&dtree1, DataFormat::JSON), print(&dtree2, DataFormat::JSON));
}

#[test]
fn rpc_and_notification() {
    let ctx = create_context();
    let rpc = DataTree::parse_op_string(
        &ctx,
        r#"{"example:ping":{"host":"192.0.2.1"}}"#,
        DataFormat::JSON,
        DataOperation::RpcYang,
    )
    .expect("Failed to parse RPC");
    let host = rpc
        .find_path("/example:ping/host")
        .expect("Failed to lookup data");
    assert_eq!(host.value_canonical().as_deref(), Some("192.0.2.1"));

    let reply = DataTree::parse_op_string(
        &ctx,
        r#"{"example:ping":{"rtt":12}}"#,
        DataFormat::JSON,
        DataOperation::ReplyYang,
    )
    .expect("Failed to parse RPC reply");
    let rtt = reply
        .find_path("/example:ping/rtt")
        .expect("Failed to lookup data");
    assert_eq!(rtt.value(), Some(DataValue::Uint32(12)));
    assert!(reply.find_path("/example:ping/host").is_err());

    let notif = DataTree::parse_op_string(
        &ctx,
        r#"{"example:alarm":{"severity":2}}"#,
        DataFormat::JSON,
        DataOperation::NotificationYang,
    )
    .expect("Failed to parse notification");
    assert!(notif.find_path("/example:alarm/severity").is_ok());

    // Plain data parsing refuses operations.
    assert!(parse(&ctx, r#"{"example:ping":{"host":"192.0.2.1"}}"#).is_err());
}

#[test]
fn errors_are_logged() {
    let ctx = create_context();
    ctx.clear_errors();
    assert!(parse(&ctx, r#"{"example:system":{"mtu":576}}"#).is_err());
    let error = ctx.last_error().expect("Missing logged error");
    assert_eq!(error.msg.as_deref(), Some("MTU too small for IPv6."));
}

#[test]
fn diff_apply_keyless_list() {
    let ctx = inline_context(&[r#"module stats {
        namespace "urn:stats";
        prefix st;
        container stats {
            config false;
            list entry {
                leaf x { type uint8; }
                leaf y { type uint8; }
            }
        }
    }"#]);
    let cases = [
        (
            r#"{"stats:stats":{"entry":[{"x":1},{"x":1},{"x":2,"y":1}]}}"#,
            r#"{"stats:stats":{"entry":[{"x":1},{"x":2,"y":2}]}}"#,
        ),
        (
            r#"{"stats:stats":{"entry":[{"x":1},{"x":2},{"x":3}]}}"#,
            r#"{"stats:stats":{"entry":[{"x":3},{"x":1},{"x":4}]}}"#,
        ),
    ];
    for (first, second) in cases {
        let mut dtree1 = parse(&ctx, first).expect("Failed to parse data tree");
        let mut dtree2 = parse(&ctx, second).expect("Failed to parse data tree");
        let expected1 = print(&dtree1, DataFormat::JSON);
        let expected2 = print(&dtree2, DataFormat::JSON);

        let diff = dtree1
            .diff(&dtree2, DataDiffFlags::empty())
            .expect("Failed to compare data trees");
        dtree1.diff_apply(&diff).expect("Failed to apply diff");
        assert_eq!(print(&dtree1, DataFormat::JSON), expected2);

        let reverse = diff.reverse().expect("Failed to reverse diff");
        dtree2.diff_apply(&reverse).expect("Failed to apply diff");
        assert_eq!(print(&dtree2, DataFormat::JSON), expected1);
    }
}

#[test]
fn json_value_encoding() {
    let ctx = inline_context(&[r#"module enc {
        namespace "urn:enc";
        prefix enc;
        container c {
            leaf small { type int8; }
            leaf big { type int64; }
            leaf flag { type boolean; }
            leaf either {
                type union {
                    type int32;
                    type string;
                }
            }
        }
    }"#]);

    assert!(parse(&ctx, r#"{"enc:c":{"small":1}}"#).is_ok());
    let error = parse(&ctx, r#"{"enc:c":{"small":"1"}}"#)
        .expect_err("String-encoded int8 accepted");
    assert_eq!(error.vecode, ValidationErrorCode::Data);
    assert!(parse(&ctx, r#"{"enc:c":{"big":"-5"}}"#).is_ok());
    assert!(parse(&ctx, r#"{"enc:c":{"big":-5}}"#).is_err());
    assert!(parse(&ctx, r#"{"enc:c":{"flag":true}}"#).is_ok());
    assert!(parse(&ctx, r#"{"enc:c":{"flag":"true"}}"#).is_err());

    // Union members are chosen by their encoding too.
    for input in [r#"{"enc:c":{"either":"5"}}"#, r#"{"enc:c":{"either":5}}"#] {
        let dtree = parse(&ctx, input).expect("Failed to parse data tree");
        assert_eq!(strip_whitespace(&print(&dtree, DataFormat::JSON)), input);
    }
}

#[test]
fn xpath_prefix_formats() {
    let ctx = inline_context(&[
        r#"module base {
            namespace "urn:base";
            prefix b;
            container c {
                leaf v { type string; }
            }
        }"#,
        r#"module extra {
            namespace "urn:extra";
            prefix x;
            import base { prefix other; }
            augment "/other:c" {
                leaf w { type uint8; }
            }
        }"#,
    ]);
    let dtree = parse(&ctx, r#"{"base:c":{"v":"one","extra:w":3}}"#)
        .expect("Failed to parse data tree");
    let select = |expression: &str, format: PrefixFormat<'_>| -> Vec<String> {
        match dtree
            .evaluate_xpath(None, expression, format)
            .expect("Failed to evaluate XPath")
        {
            XPathValue::NodeSet(dnodes) => dnodes.iter().map(|dnode| dnode.path()).collect(),
            value => panic!("Unexpected XPath value {:?}", value),
        }
    };

    let expected = vec!["/base:c/extra:w".to_owned()];
    assert_eq!(select("/base:c/extra:w", PrefixFormat::Json), expected);
    assert_eq!(select("/other:c/x:w", PrefixFormat::Schema("extra")), expected);
    let namespaces = [("p", "urn:base"), ("q", "urn:extra")];
    assert_eq!(select("/p:c/q:w", PrefixFormat::Xml(&namespaces)), expected);

    // Module names are not prefixes of the importing module.
    assert!(dtree
        .evaluate_xpath(None, "/base:c", PrefixFormat::Schema("extra"))
        .is_err());
    assert_eq!(
        dtree
            .evaluate_xpath(None, "string(/p:c/p:v)", PrefixFormat::Xml(&namespaces))
            .expect("Failed to evaluate XPath"),
        XPathValue::String("one".to_owned())
    );
}

#[test]
fn when_conditions_not_converging() {
    let ctx = inline_context(&[r#"module flip {
        namespace "urn:flip";
        prefix f;
        container c {
            leaf a {
                when "not(../b)";
                type string;
                default "on";
            }
            leaf b {
                when "../a";
                type string;
                default "on";
            }
        }
    }"#]);
    let error = parse(&ctx, r#"{"flip:c":{}}"#)
        .expect_err("Oscillating when conditions accepted");
    assert_eq!(error.errcode, ErrorCode::Incomplete);
}
