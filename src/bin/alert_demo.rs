//! Sends one guest-recovery alert through the configured notifier.
//! Without provider credentials this only logs (demo mode).
//!
//! Usage: `alert_demo <phone> [rating] [guest name]`

use review_sentinel::config::AppConfig;
use review_sentinel::notify::{any_dispatched, build_notifier, GuestAlert};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let mut args = std::env::args().skip(1);
    let phone = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: alert_demo <phone> [rating] [guest name]"))?;
    let rating: u8 = args.next().map(|r| r.parse()).transpose()?.unwrap_or(1);
    let name = args.next();

    let cfg = AppConfig::load()?;
    let notifier = build_notifier(&cfg.notify);
    let property_name = cfg
        .properties
        .first()
        .map(|p| p.name.clone())
        .unwrap_or_else(|| "Demo Property".to_string());

    let deliveries = notifier
        .send_guest_alert(&GuestAlert {
            phone,
            name,
            property_name,
            rating: rating.clamp(1, 5),
        })
        .await;

    for d in &deliveries {
        println!(
            "{:<10} {:<7} {}",
            d.channel,
            d.status.as_str(),
            d.detail.as_deref().unwrap_or("")
        );
    }
    println!(
        "alert-demo done via {} (dispatched: {})",
        notifier.name(),
        any_dispatched(&deliveries)
    );
    Ok(())
}
