use anyhow::{Error, Result};
use clap::{arg, ArgMatches, Command};
use uuid::Uuid;

use klarna_checkout::client::Client;
use klarna_checkout::db::StoreExt;
use klarna_checkout::{mock, Checkout, Payment, PaymentDetails};

pub fn cmds() -> Vec<Command> {
    vec![
        Command::new("mock")
            .display_order(10)
            .about("Creates a mock order with a payment ready to be captured"),
        Command::new("capture")
            .display_order(11)
            .about("Creates or resumes Klarna sessions and prints the checkout url")
            .arg(arg!(<payment> "Payment id")),
        Command::new("complete")
            .display_order(12)
            .about("Places the Klarna order for an authorized payment")
            .arg(arg!(<payment> "Payment id"))
            .arg(arg!(<authorization_token> "Authorization token returned by Klarna")),
        Command::new("confirm")
            .display_order(13)
            .about("Records an order Klarna placed from the hosted payment page")
            .arg(arg!(<payment> "Payment id"))
            .arg(arg!(<order_id> "Order id returned by Klarna")),
        Command::new("cancel")
            .display_order(14)
            .about("Drops the Klarna sessions of a payment and marks it canceled")
            .arg(arg!(<payment> "Payment id")),
        Command::new("session")
            .display_order(15)
            .about("Shows stored session details and their status on Klarna")
            .arg(arg!(<payment> "Payment id")),
    ]
}

pub async fn run(name: &str, matches: &ArgMatches, checkout: &Checkout) -> Result<()> {
    match name {
        "mock" => {
            let (order, payment) = mock::generate(checkout.store())?;
            let token = checkout.capture_token(payment.id)?;
            println!("order:   {} (#{})", order.id, order.number);
            println!("payment: {}", payment.id);
            println!("capture: {}", token.target_url);
        }
        "capture" => {
            let payment = payment_id(matches)?;
            let token = checkout.capture_token(payment)?;
            let target = checkout.proceed(payment, &token).await?;
            println!("{}", target);
        }
        "complete" => {
            let payment = payment_id(matches)?;
            let authorization_token = matches
                .get_one::<String>("authorization_token")
                .ok_or_else(|| Error::msg("authorization token is required"))?;
            let order = checkout.complete(payment, authorization_token, None).await?;
            println!("order: {} ({})", order.order_id, order.fraud_status);
        }
        "confirm" => {
            let payment = payment_id(matches)?;
            let order_id = matches
                .get_one::<String>("order_id")
                .ok_or_else(|| Error::msg("order id is required"))?;
            let payment = checkout.confirm_order(payment, order_id, None).await?;
            println!("payment {} succeeded: {:?}", payment.id, payment.status);
        }
        "cancel" => {
            let payment = checkout.cancel(payment_id(matches)?).await?;
            println!("payment {} canceled", payment.id);
        }
        "session" => session(checkout, payment_id(matches)?).await?,
        _ => unimplemented!(),
    }

    Ok(())
}

async fn session(checkout: &Checkout, payment: Uuid) -> Result<()> {
    let payment = checkout.store().get::<Payment>(payment)?;
    println!("status: {:?}", payment.status);
    println!("{}", serde_json::to_string_pretty(&payment.details)?);

    let details = PaymentDetails::from_stored(&payment.details)?;
    let client = checkout.client();
    if let Some(id) = details.payment_session_id() {
        let remote = client.read_payment_session(checkout.context(), id).await?;
        println!(
            "payment session {}: {} (expires {})",
            id, remote.status, remote.expires_at
        );
    }
    if let Some(id) = details.hosted_payment_page_id() {
        let remote = client
            .read_hosted_payment_page_session(checkout.context(), id)
            .await?;
        println!(
            "hosted payment page {}: {} (expires {})",
            id, remote.status, remote.expires_at
        );
    }

    Ok(())
}

fn payment_id(matches: &ArgMatches) -> Result<Uuid> {
    let id = matches
        .get_one::<String>("payment")
        .ok_or_else(|| Error::msg("payment id is required"))?;
    Ok(id.parse()?)
}
