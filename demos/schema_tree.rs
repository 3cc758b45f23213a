use yangrs::context::{Context, ContextFlags};
use yangrs::schema::{SchemaOutputFormat, SchemaPrinterFlags};

static SEARCH_DIR: &str = "./assets/yang/";

fn main() -> std::io::Result<()> {
    // Initialize context.
    let mut ctx = Context::new(ContextFlags::NO_YANGLIBRARY)
        .expect("Failed to create context");
    ctx.set_searchdir(SEARCH_DIR)
        .expect("Failed to set YANG search directory");

    // Load test modules.
    for module_name in &["example", "example-augment"] {
        ctx.load_module(module_name, None, &[])
            .expect("Failed to load module");
    }

    // Print the tree diagram of every module.
    for module in ctx.modules(true) {
        module
            .print_file(
                std::io::stdout(),
                SchemaOutputFormat::TREE,
                SchemaPrinterFlags::empty(),
            )
            .expect("Failed to print module");
        println!();
    }

    Ok(())
}
