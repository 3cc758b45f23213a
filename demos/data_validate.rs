use std::fs::File;
use yangrs::context::{Context, ContextFlags};
use yangrs::data::{
    Data, DataFormat, DataParserFlags, DataPrinterFlags, DataTree,
    DataValidationFlags,
};

static SEARCH_DIR: &str = "./assets/yang/";

fn main() -> std::io::Result<()> {
    // Initialize context.
    let mut ctx = Context::new(ContextFlags::NO_YANGLIBRARY)
        .expect("Failed to create context");
    ctx.set_searchdir(SEARCH_DIR)
        .expect("Failed to set YANG search directory");
    ctx.load_module("example", None, &[])
        .expect("Failed to load module");

    // Parse data tree without validating it.
    let mut dtree = DataTree::parse_file(
        &ctx,
        File::open("./assets/data/system.json")?,
        DataFormat::JSON,
        DataParserFlags::NO_VALIDATION,
        DataValidationFlags::empty(),
    )
    .expect("Failed to parse data tree");

    // A small MTU is only allowed on IPv4-only systems.
    dtree
        .new_path("/example:system/mtu", Some("576"), false)
        .expect("Failed to edit data tree");
    match dtree.validate(DataValidationFlags::NO_STATE) {
        Ok(()) => println!("Data tree is valid"),
        Err(error) => println!(
            "Validation failed: {} (path: {:?}, app-tag: {:?})",
            error.msg.as_deref().unwrap_or_default(),
            error.path,
            error.apptag
        ),
    }

    dtree
        .new_path("/example:system/ipv4-only", Some("true"), false)
        .expect("Failed to edit data tree");
    dtree
        .validate(DataValidationFlags::NO_STATE)
        .expect("Failed to validate data tree");

    // Print the validated tree with all its default values.
    dtree
        .print_file(
            std::io::stdout(),
            DataFormat::JSON,
            DataPrinterFlags::WD_ALL | DataPrinterFlags::WITH_SIBLINGS,
        )
        .expect("Failed to print data tree");

    Ok(())
}
