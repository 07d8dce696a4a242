use super::AppContext;
use crate::settings::{delete_setting, get_settings, set_setting};

pub fn list_settings(ctx: &AppContext) -> anyhow::Result<()> {
    let settings = get_settings(&ctx.db)?;
    let width = settings.keys().map(|k| k.len()).max().unwrap_or(0);
    for (key, (value, stored)) in &settings {
        let marker = if *stored { "" } else { "  (default)" };
        println!("{:<width$}  {}{}", key, value, marker);
    }
    Ok(())
}

pub fn update_setting(ctx: &AppContext, key: &str, value: &str) -> anyhow::Result<()> {
    set_setting(&ctx.db, key, value)?;
    println!("{} = {}", key, value.trim());
    Ok(())
}

pub fn reset_setting(ctx: &AppContext, key: &str) -> anyhow::Result<()> {
    delete_setting(&ctx.db, key)?;
    println!("{} reset to default", key);
    Ok(())
}
