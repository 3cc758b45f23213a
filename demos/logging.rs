use log::LevelFilter;
use yangrs::context::{Context, ContextFlags};

fn main() {
    env_logger::Builder::new()
        .filter_level(LevelFilter::max())
        .init();
    let mut ctx = Context::new(ContextFlags::NO_YANGLIBRARY).unwrap();
    ctx.set_log_level_debug();
    ctx.init_default_logger().unwrap();
    ctx.set_searchdir("./assets/yang/").unwrap();
    // When loading modules, we should see some logs
    let _module = ctx.load_module("ietf-interfaces", None, &[]).unwrap();
    // A failed load is logged as an error
    let _ = ctx.load_module("no-such-module", None, &[]);
}
