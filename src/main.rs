use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::{error, info, Instrument};

use meatup_orders::app_system::{setup_tracing, CartLine, OrderSystem, PlaceOrder};
use meatup_orders::config::AppConfig;
use meatup_orders::domain::{OrderStatus, Product, UserCreate};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    setup_tracing();

    info!(?config, "Starting order system");
    let system = OrderSystem::new(config);

    let span = tracing::info_span!("sign_up");
    let user_id = async {
        info!("Creating demo customer");
        system
            .users
            .create_user(
                UserCreate::new("demo_uid", "Asha", "asha@example.com")
                    .with_address("12 Harbour Road"),
            )
            .await
    }
    .instrument(span)
    .await
    .context("creating demo customer")?;

    let chicken = system
        .catalog
        .create_product(
            Product::new("", "Chicken Curry Cut", Decimal::from(280), "kg")
                .with_variant("Boneless", Decimal::from(360))
                .into(),
        )
        .await
        .context("creating product")?;
    let mutton = system
        .catalog
        .create_product(Product::new("", "Mutton", Decimal::from(750), "kg").into())
        .await
        .context("creating product")?;

    let span = tracing::info_span!("checkout", user_id = %user_id);
    let receipt = async {
        system
            .lifecycle
            .place_order(PlaceOrder {
                user_id: user_id.clone(),
                lines: vec![
                    CartLine {
                        product_id: chicken.clone(),
                        quantity: 2,
                        weight: Decimal::new(15, 1),
                        cutting_type: Some("Boneless".to_string()),
                    },
                    CartLine {
                        product_id: mutton.clone(),
                        quantity: 1,
                        weight: Decimal::ONE,
                        cutting_type: None,
                    },
                ],
                address: "12 Harbour Road".to_string(),
                delivery_estimate: Some("Today, 6-7 PM".to_string()),
                redeem_points: 0,
                note: None,
            })
            .await
    }
    .instrument(span)
    .await
    .context("placing order")?;
    info!(order_id = %receipt.id, display_id = %receipt.display_id, "Order placed");

    // What the simulator would do, one tick at a time
    let mut status = OrderStatus::Pending;
    while let Some(next) = status.next() {
        if let Err(e) = system.lifecycle.advance_status(&receipt.id, next).await {
            error!(error = %e, status = %next, "Status update failed");
            break;
        }
        status = next;
    }

    let order = system.orders.get_by_id(&receipt.id).await?;
    println!("{}", serde_json::to_string_pretty(&order)?);
    println!("wallet balance: {}", system.wallet.get_balance(&user_id).await?);

    system
        .shutdown()
        .await
        .map_err(anyhow::Error::msg)
        .context("shutting down")?;

    info!("Application completed successfully");
    Ok(())
}
