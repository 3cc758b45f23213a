use yangrs::context::{Context, ContextFlags};
use yangrs::data::{
    Data, DataDiffFlags, DataFormat, DataParserFlags, DataPrinterFlags,
    DataTree, DataValidationFlags,
};
use yangrs::schema::DataValue;

static SEARCH_DIR: &str = "./assets/yang/";
static JSON_TREE1: &str = r###"
    {
        "ietf-interfaces:interfaces":{
            "interface": [
                {
                    "name": "eth/0/0",
                    "description": "ENG",
                    "type": "iana-if-type:ethernetCsmacd",
                    "enabled": true
                }
            ],
            "interface": [
                {
                    "name": "eth/0/1",
                    "description": "MKT",
                    "type": "iana-if-type:ethernetCsmacd",
                    "enabled": true
                }
            ]
        }
    }"###;
static JSON_TREE2: &str = r###"
    {
        "ietf-interfaces:interfaces":{
            "interface": [
                {
                    "name": "eth/0/0",
                    "description": "ENG",
                    "type": "iana-if-type:ethernetCsmacd",
                    "enabled": false
                }
            ],
            "interface": [
                {
                    "name": "eth/0/2",
                    "description": "MGMT",
                    "type": "iana-if-type:ethernetCsmacd",
                    "enabled": true
                }
            ]
        }
    }"###;
static JSON_MERGE: &str = r###"
    {
        "ietf-interfaces:interfaces":{
            "interface": [
                {
                    "name": "eth/0/0",
                    "description": "ENG",
                    "type": "iana-if-type:ethernetCsmacd",
                    "enabled": false
                }
            ],
            "interface": [
                {
                    "name": "eth/0/1",
                    "description": "MKT",
                    "type": "iana-if-type:ethernetCsmacd",
                    "enabled": true
                }
            ],
            "interface": [
                {
                    "name": "eth/0/2",
                    "description": "MGMT",
                    "type": "iana-if-type:ethernetCsmacd",
                    "enabled": true
                }
            ]
        }
    }"###;

static JSON_DIFF: &str = r###"
    {
      "ietf-interfaces:interfaces": {
        "@": {
          "yang:operation": "none"
        },
        "interface": [
          {
            "name": "eth/0/0",
            "enabled": false,
            "@enabled": {
              "yang:operation": "replace",
              "yang:orig-default": false,
              "yang:orig-value": "true"
            }
          },      {
            "@": {
              "yang:operation": "delete"
            },
            "name": "eth/0/1",
            "description": "MKT",
            "type": "iana-if-type:ethernetCsmacd",
            "enabled": true
          },      {
            "@": {
              "yang:operation": "create"
            },
            "name": "eth/0/2",
            "description": "MGMT",
            "type": "iana-if-type:ethernetCsmacd",
            "enabled": true
          }
        ]
      }
    }
"###;

macro_rules! assert_data_eq {
    ($dtree1:expr, $dtree2:expr) => {
        let json1 = $dtree1
            .print_string(DataFormat::JSON, DataPrinterFlags::WITH_SIBLINGS)
            .expect("Failed to print data");
        let json2 = $dtree2
            .print_string(DataFormat::JSON, DataPrinterFlags::WITH_SIBLINGS)
            .expect("Failed to print data");

        assert_eq!(json1, json2);
    };
}

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

fn parse_json_data<'a>(ctx: &'a Context, string: &str) -> DataTree<'a> {
    DataTree::parse_string(
        ctx,
        string,
        DataFormat::JSON,
        DataParserFlags::NO_VALIDATION,
        DataValidationFlags::empty(),
    )
    .expect("Failed to parse data tree")
}

#[test]
fn data_find_xpath() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);

    assert_eq!(
        dtree1
            .find_xpath("/ietf-interfaces:interfaces/interface")
            .expect("Failed to lookup data")
            .map(|dnode| dnode.path())
            .collect::<Vec<String>>(),
        vec![
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']",
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']"
        ]
    );

    assert_eq!(
        dtree1
            .find_xpath("/ietf-interfaces:interfaces/interface[name='eth/0/0']/*")
            .expect("Failed to lookup data")
            .map(|dnode| dnode.path())
            .collect::<Vec<String>>(),
        vec![
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/name",
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/description",
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/type",
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/enabled",
        ]
    );
}

#[test]
fn data_find_path() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);

    assert!(dtree1
        .find_path("/ietf-interfaces:interfaces/interface")
        .is_err());
    assert!(dtree1
        .find_path("/ietf-interfaces:interfaces/interface[name='eth/0/0']")
        .is_ok());
    assert!(dtree1
        .find_path("/ietf-interfaces:interfaces/interface[name='eth/0/9']")
        .is_err());
}

#[test]
fn data_edit() {
    let ctx = create_context();
    let mut dtree1 = parse_json_data(&ctx, JSON_TREE1);
    let dtree2 = parse_json_data(&ctx, JSON_TREE2);

    enum Operation {
        Modify(&'static str, Option<&'static str>),
        Delete(&'static str),
    }

    let changes = [
        Operation::Modify(
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/enabled",
            Some("false"),
        ),
        Operation::Delete(
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']",
        ),
        Operation::Modify(
            "/ietf-interfaces:interfaces/interface[name='eth/0/2']/description",
            Some("MGMT"),
        ),
        Operation::Modify(
            "/ietf-interfaces:interfaces/interface[name='eth/0/2']/type",
            Some("iana-if-type:ethernetCsmacd"),
        ),
        Operation::Modify(
            "/ietf-interfaces:interfaces/interface[name='eth/0/2']/enabled",
            Some("true"),
        ),
    ];
    for change in &changes {
        match change {
            Operation::Modify(xpath, value) => {
                dtree1
                    .new_path(xpath, *value, false)
                    .expect("Failed to edit data tree");
            }
            Operation::Delete(xpath) => {
                dtree1.remove(xpath).expect("Failed to edit data tree")
            }
        };
    }

    assert_data_eq!(&dtree1, &dtree2);
}

#[test]
fn data_edit_invalid_value() {
    let ctx = create_context();
    let mut dtree1 = parse_json_data(&ctx, JSON_TREE1);

    assert!(dtree1
        .new_path(
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/enabled",
            Some("maybe"),
            false,
        )
        .is_err());
    assert!(dtree1
        .new_path(
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/type",
            Some("iana-if-type:unknownType"),
            false,
        )
        .is_err());
}

#[test]
fn data_validate() {
    let ctx = create_context();
    let mut dtree1 = parse_json_data(&ctx, JSON_TREE1);

    // Mandatory node "oper-status" instance does not exist.
    // (path: /ietf-interfaces:interfaces/interface/oper-status)
    assert!(dtree1.validate(DataValidationFlags::PRESENT).is_err());

    // Configuration only.
    let mut dtree1 = parse_json_data(&ctx, JSON_TREE1);
    dtree1
        .validate(DataValidationFlags::NO_STATE | DataValidationFlags::PRESENT)
        .expect("Failed to validate data tree");
}

#[test]
fn data_duplicate() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);
    let dup = dtree1.duplicate().expect("Failed to duplicate data");

    assert_data_eq!(&dtree1, &dup);
}

#[test]
fn data_merge() {
    let ctx = create_context();
    let mut dtree1 = parse_json_data(&ctx, JSON_TREE1);
    let dtree2 = parse_json_data(&ctx, JSON_TREE2);
    let dtree_merge = parse_json_data(&ctx, JSON_MERGE);

    dtree1.merge(&dtree2).expect("Failed to merge data trees");
    assert_data_eq!(&dtree1, &dtree_merge);
}

#[test]
fn data_diff() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);
    let dtree2 = parse_json_data(&ctx, JSON_TREE2);
    let dtree_diff = parse_json_data(&ctx, JSON_DIFF);

    let diff = dtree1
        .diff(&dtree2, DataDiffFlags::empty())
        .expect("Failed to compare data trees");
    assert_data_eq!(&diff, &dtree_diff);
}

#[test]
fn data_diff_apply() {
    let ctx = create_context();
    let mut dtree1 = parse_json_data(&ctx, JSON_TREE1);
    let dtree2 = parse_json_data(&ctx, JSON_TREE2);

    let diff = dtree1
        .diff(&dtree2, DataDiffFlags::empty())
        .expect("Failed to compare data trees");
    dtree1.diff_apply(&diff).expect("Failed to apply diff");

    assert_data_eq!(&dtree1, &dtree2);
}

#[test]
fn data_diff_reverse() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);
    let mut dtree2 = parse_json_data(&ctx, JSON_TREE2);

    let diff = dtree1
        .diff(&dtree2, DataDiffFlags::empty())
        .expect("Failed to compare data trees");
    let reverse = diff.reverse().expect("Failed to reverse diff");
    dtree2.diff_apply(&reverse).expect("Failed to apply diff");

    assert_data_eq!(&dtree2, &dtree1);
}

#[test]
fn data_diff_iter() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);
    let dtree2 = parse_json_data(&ctx, JSON_TREE2);

    let diff = dtree1
        .diff(&dtree2, DataDiffFlags::empty())
        .expect("Failed to compare data trees");
    assert_eq!(
        diff.iter()
            .map(|(op, dnode)| format!("{:?} {}", op, dnode.path()))
            .collect::<Vec<String>>(),
        vec![
            "Replace /ietf-interfaces:interfaces/interface[name='eth/0/0']/enabled",
            "Delete /ietf-interfaces:interfaces/interface[name='eth/0/1']",
            "Create /ietf-interfaces:interfaces/interface[name='eth/0/2']",
        ]
    );
}

#[test]
fn data_iterator_traverse() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);

    assert_eq!(
        dtree1
            .traverse()
            .map(|dnode| dnode.path())
            .collect::<Vec<String>>(),
        vec![
            "/ietf-interfaces:interfaces",
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']",
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/name",
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/description",
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/type",
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']/enabled",
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']",
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']/name",
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']/description",
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']/type",
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']/enabled"
        ]
    );
}

#[test]
fn data_iterator_ancestors() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);

    assert_eq!(
        dtree1
            .find_path(
                "/ietf-interfaces:interfaces/interface[name='eth/0/0']/type",
            )
            .expect("Failed to lookup data")
            .ancestors()
            .map(|dnode| dnode.path())
            .collect::<Vec<String>>(),
        vec![
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']",
            "/ietf-interfaces:interfaces",
        ]
    );
}

#[test]
fn data_iterator_siblings() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);

    assert_eq!(
        dtree1
            .find_path(
                "/ietf-interfaces:interfaces/interface[name='eth/0/0']"
            )
            .expect("Failed to lookup data")
            .siblings()
            .map(|dnode| dnode.path())
            .collect::<Vec<String>>(),
        vec!["/ietf-interfaces:interfaces/interface[name='eth/0/1']",]
    );
}

#[test]
fn data_iterator_children() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);

    assert_eq!(
        dtree1
            .find_path("/ietf-interfaces:interfaces")
            .expect("Failed to lookup data")
            .children()
            .map(|dnode| dnode.path())
            .collect::<Vec<String>>(),
        vec![
            "/ietf-interfaces:interfaces/interface[name='eth/0/0']",
            "/ietf-interfaces:interfaces/interface[name='eth/0/1']",
        ]
    );
}

#[test]
fn data_node_values() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);

    let dnode = dtree1
        .find_path("/ietf-interfaces:interfaces/interface[name='eth/0/0']/enabled")
        .expect("Failed to lookup data");
    assert_eq!(dnode.value(), Some(DataValue::Bool(true)));
    assert_eq!(dnode.value_canonical().as_deref(), Some("true"));
    // Explicitly set to the schema default.
    assert!(dnode.is_default());
    assert!(!dnode.is_implicit());

    let dnode = dtree1
        .find_path("/ietf-interfaces:interfaces")
        .expect("Failed to lookup data");
    assert!(!dnode.is_default());

    let dnode = dtree1
        .find_path("/ietf-interfaces:interfaces/interface[name='eth/0/0']/type")
        .expect("Failed to lookup data");
    assert_eq!(
        dnode.value_canonical().as_deref(),
        Some("iana-if-type:ethernetCsmacd")
    );

    let dnode = dtree1
        .find_path("/ietf-interfaces:interfaces/interface[name='eth/0/1']")
        .expect("Failed to lookup data");
    assert_eq!(
        dnode
            .list_keys()
            .map(|key| key.value_canonical().unwrap_or_default())
            .collect::<Vec<String>>(),
        vec!["eth/0/1"]
    );
}

#[test]
fn data_json_xml_roundtrip() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);

    let xml = dtree1
        .print_string(DataFormat::XML, DataPrinterFlags::WITH_SIBLINGS)
        .expect("Failed to print data");
    let dtree2 = DataTree::parse_string(
        &ctx,
        &xml,
        DataFormat::XML,
        DataParserFlags::NO_VALIDATION,
        DataValidationFlags::empty(),
    )
    .expect("Failed to parse data tree");

    assert_data_eq!(&dtree1, &dtree2);
}

#[test]
fn data_lyb_roundtrip() {
    let ctx = create_context();
    let dtree1 = parse_json_data(&ctx, JSON_TREE1);

    let lyb = dtree1
        .print_bytes(DataFormat::LYB, DataPrinterFlags::WITH_SIBLINGS)
        .expect("Failed to print data");
    let dtree2 = DataTree::parse_string(
        &ctx,
        &lyb,
        DataFormat::LYB,
        DataParserFlags::NO_VALIDATION,
        DataValidationFlags::empty(),
    )
    .expect("Failed to parse data tree");

    assert_data_eq!(&dtree1, &dtree2);
    assert!(dtree1
        .print_string(DataFormat::LYB, DataPrinterFlags::WITH_SIBLINGS)
        .is_err());
}

#[test]
fn data_context_rejects_state() {
    let mut ctx =
        Context::new(ContextFlags::NO_YANGLIBRARY | ContextFlags::NO_STATE)
            .expect("Failed to create context");
    ctx.set_searchdir(SEARCH_DIR)
        .expect("Failed to set YANG search directory");
    for module_name in &["ietf-interfaces", "iana-if-type"] {
        ctx.load_module(module_name, None, &[])
            .expect("Failed to load module");
    }

    let json = r#"{"ietf-interfaces:interfaces": {"interface": [{
        "name": "eth/0/0",
        "type": "iana-if-type:ethernetCsmacd",
        "oper-status": "up"
    }]}}"#;
    assert!(DataTree::parse_string(
        &ctx,
        json,
        DataFormat::JSON,
        DataParserFlags::NO_VALIDATION,
        DataValidationFlags::empty(),
    )
    .is_err());

    // Configuration data is still accepted.
    parse_json_data(&ctx, JSON_TREE1);
}
