//! Example mod that offers a greeting API.
//!
//! Build with `cargo build -p greeter-api` and copy the library next to
//! `manifest.json` in a folder under the mods root.
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use modhost_core::{ApiObject, ApiTable, Mod, ModHelper, ModResult};
use parking_lot::RwLock;

const DEFAULT_GREETING: &str = "Hello, {{name}}!";

#[derive(Default)]
pub struct GreeterApi {
    template: Arc<RwLock<String>>,
    greeted: Arc<AtomicI64>,
}

impl GreeterApi {
    fn greet(template: &RwLock<String>, greeted: &AtomicI64, name: &str) -> String {
        greeted.fetch_add(1, Ordering::SeqCst);
        let template = template.read();
        let template = if template.is_empty() { DEFAULT_GREETING } else { template.as_str() };
        template.replace("{{name}}", name.trim())
    }
}

impl Mod for GreeterApi {
    fn entry(&mut self, helper: Arc<ModHelper>) -> ModResult<()> {
        if let Some(template) = helper.translation().get("greeting") {
            *self.template.write() = template;
        }

        let template = self.template.clone();
        let greeted = self.greeted.clone();
        let monitor_helper = helper.clone();
        helper.commands().add("greet", "Greets someone. Usage: greet <name>", move |_, args| {
            let name = if args.is_empty() { "farmer".to_string() } else { args.join(" ") };
            monitor_helper
                .monitor()
                .info(&Self::greet(&template, &greeted, &name));
        })?;

        helper.monitor().info("Greeter ready.");
        Ok(())
    }

    fn api(&self) -> ModResult<Option<ApiObject>> {
        let template = self.template.clone();
        let greeted = self.greeted.clone();
        let count = self.greeted.clone();
        Ok(Some(
            ApiTable::new("greeter_api::GreeterApi")
                .method("greet", move |name: String| Self::greet(&template, &greeted, &name))
                .method("greeted_count", move || count.load(Ordering::SeqCst))
                .build(),
        ))
    }
}

modhost_core::declare_mod!(GreeterApi);

#[cfg(test)]
mod tests;
