//! Example mod that talks to another mod's API without linking to it.
use std::sync::Arc;

use modhost_core::{Mod, ModHelper, ModResult};

const GREETER_ID: &str = "Modhost.GreeterApi";

modhost_core::define_interface! {
    /// The subset of the greeter API this mod relies on
    pub trait Greeter as GreeterProxy {
        fn greet(name: String) -> String;
        fn greeted_count() -> i64;
    }
}

#[derive(Default)]
pub struct GreeterClient;

impl GreeterClient {
    /// Bridge to the greeter. APIs are only available once every mod's
    /// entry has run, so this is called from commands, never from `entry`.
    fn greeter(helper: &ModHelper) -> Result<GreeterProxy, String> {
        match helper.registry().get_api::<GreeterProxy>(GREETER_ID) {
            Ok(Some(greeter)) => Ok(greeter),
            Ok(None) => Err(format!("{GREETER_ID} doesn't expose an API")),
            Err(e) => Err(e.to_string()),
        }
    }
}

impl Mod for GreeterClient {
    fn entry(&mut self, helper: Arc<ModHelper>) -> ModResult<()> {
        let captured = helper.clone();
        helper.commands().add("welcome", "Welcomes someone via the greeter. Usage: welcome <name>", move |_, args| {
            let name = args.join(" ");
            let result = Self::greeter(&captured).and_then(|greeter| {
                let text = greeter.greet(name).map_err(|e| e.to_string())?;
                let count = greeter.greeted_count().map_err(|e| e.to_string())?;
                Ok(format!("{text} ({count} greeted so far)"))
            });
            match result {
                Ok(text) => captured.monitor().info(&text),
                Err(e) => captured.monitor().warn(&format!("Can't reach the greeter: {e}")),
            }
        })?;
        helper.monitor().trace("welcome command registered");
        Ok(())
    }
}

modhost_core::declare_mod!(GreeterClient);
