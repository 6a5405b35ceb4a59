use crate::context::Context;
use crate::output::{print_json, print_table};
use xenv_core::types::Scope;

pub fn run(ctx: &Context, json: bool) -> anyhow::Result<()> {
    let manager = ctx.manager()?;
    let resolved = manager.resolved();

    if json {
        let value = serde_json::json!({
            "global": manager.global(),
            "direnv": manager.direnv(),
            "session": manager.session(),
            "resolved": resolved,
        });
        return print_json(&value);
    }

    let mut rows = Vec::new();
    for scope in Scope::all() {
        let Some(state) = manager.scope(*scope) else {
            continue;
        };
        for is_sdk in [true, false] {
            for (name, version) in state.versions(is_sdk) {
                // The layer that wins the merge is the one that applies.
                let in_effect = resolved.versions(is_sdk).get(name) == Some(version)
                    && Scope::all()
                        .iter()
                        .skip_while(|s| *s != scope)
                        .skip(1)
                        .all(|later| {
                            manager
                                .scope(*later)
                                .map_or(true, |s| !s.versions(is_sdk).contains_key(name))
                        });
                rows.push(vec![
                    if in_effect { "*" } else { "" }.to_string(),
                    name.clone(),
                    version.clone(),
                    scope.to_string(),
                    if is_sdk { "sdk" } else { "tool" }.to_string(),
                ]);
            }
        }
    }

    if rows.is_empty() {
        println!("No tools active.");
        return Ok(());
    }
    print_table(&["", "NAME", "VERSION", "SCOPE", "KIND"], rows);
    Ok(())
}
