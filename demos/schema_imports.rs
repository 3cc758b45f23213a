use yangrs::context::{Context, ContextFlags};

static SEARCH_DIR: &str = "./assets/yang/";
static MODULE_NAME: &str = "ietf-interfaces";

fn main() -> std::io::Result<()> {
    // Initialize context
    let mut ctx = Context::new(ContextFlags::NO_YANGLIBRARY)
        .expect("Failed to create context");

    // Set search directory
    ctx.set_searchdir(SEARCH_DIR)
        .expect("Failed to set YANG search directory");

    // Load the module
    let module = ctx
        .load_module(MODULE_NAME, None, &[])
        .expect("Failed to load module");

    println!("Module '{}' imports:\n", module.name());

    for import in module.imports() {
        println!("  Prefix: {}", import.prefix());
        if let Some(revision) = import.revision() {
            println!("    Revision-date: {}", revision);
        }

        let imported_module = import.module();
        println!("      Name: {}", imported_module.name());
        println!("      Namespace: {}", imported_module.namespace());

        if let Some(filepath) = imported_module.filepath() {
            println!("      File path: {}", filepath);
        }

        if let Some(revision) = imported_module.revision() {
            println!("      Revision: {}", revision);
        }

        if let Some(description) = imported_module.description() {
            let description_oneline =
                description.replace('\n', " ").replace('\r', " ");
            println!("      Description: {}", description_oneline);
        }
        println!()
    }

    Ok(())
}
