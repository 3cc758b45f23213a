use yangrs::context::{Context, ContextFlags};
use yangrs::schema::diff::schema_diff;

static SEARCH_DIR: &str = "./assets/yang/";

fn main() -> std::io::Result<()> {
    // The same module, with and without its augmentation and deviation.
    let mut old_ctx = Context::new(ContextFlags::NO_YANGLIBRARY)
        .expect("Failed to create context");
    old_ctx
        .set_searchdir(SEARCH_DIR)
        .expect("Failed to set YANG search directory");
    old_ctx
        .load_module("example", None, &[])
        .expect("Failed to load module");

    let mut new_ctx = Context::new(ContextFlags::NO_YANGLIBRARY)
        .expect("Failed to create context");
    new_ctx
        .set_searchdir(SEARCH_DIR)
        .expect("Failed to set YANG search directory");
    new_ctx
        .load_module("example", None, &["extra"])
        .expect("Failed to load module");
    new_ctx
        .load_module("example-augment", None, &[])
        .expect("Failed to load module");

    // Compare both schemas, leaving the RPCs aside.
    for change in schema_diff(&old_ctx, &new_ctx, |snode| snode.name() == "ping")
    {
        println!("{}", change);
    }

    Ok(())
}
