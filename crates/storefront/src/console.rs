//! Line console for the `smartshop` binary.
//!
//! One command per line. Output goes to any `io::Write` so sessions can be
//! scripted in tests.

use std::io::{self, Write};
use std::str::FromStr;

use rust_decimal::Decimal;
use smartshop_core::{InvoiceId, PaymentMethod, ProductDraft, ProductId, format_vnd};
use thiserror::Error;

use crate::cache::CacheBackend;
use crate::controller::Controller;
use crate::remote::RemoteStore;

pub const HELP: &str = "\
commands:
  list                  products matching the search
  find <term>           set the search term (empty clears it)
  add <id> [qty]        add a product to the cart
  qty <id> <+n|-n>      change a cart line
  rm <id>               remove a cart line
  cart                  show the cart
  pay <cash|transfer|debt>
  close                 close the open invoice
  invoices              invoice history
  new <price> <name>    create a product
  del <id>              delete a product
  void <invoice-id>     delete an invoice
  retry                 reconnect to the database
  status                backend health
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Find(String),
    Add { id: ProductId, quantity: u32 },
    Quantity { id: ProductId, delta: i64 },
    Remove(ProductId),
    Cart,
    Pay(PaymentMethod),
    Close,
    Invoices,
    New { name: String, price: Decimal },
    Delete(ProductId),
    Void(InvoiceId),
    Retry,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command: {0} (try `help`)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("not a number: {0}")]
    Number(String),
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let mut args = rest.split_whitespace();

        match verb {
            "list" | "ls" => Ok(Self::List),
            "find" => Ok(Self::Find(rest.to_string())),
            "add" => {
                let id = args.next().ok_or(ParseError::Usage("add <id> [qty]"))?;
                let quantity = args.next().map_or(Ok(1), parse_number::<u32>)?;
                Ok(Self::Add {
                    id: ProductId::new(id),
                    quantity,
                })
            }
            "qty" => match (args.next(), args.next()) {
                (Some(id), Some(delta)) => Ok(Self::Quantity {
                    id: ProductId::new(id),
                    delta: parse_number(delta.trim_start_matches('+'))?,
                }),
                _ => Err(ParseError::Usage("qty <id> <+n|-n>")),
            },
            "rm" => args
                .next()
                .map(|id| Self::Remove(ProductId::new(id)))
                .ok_or(ParseError::Usage("rm <id>")),
            "cart" => Ok(Self::Cart),
            "pay" => args
                .next()
                .and_then(|m| m.parse().ok())
                .map(Self::Pay)
                .ok_or(ParseError::Usage("pay <cash|transfer|debt>")),
            "close" => Ok(Self::Close),
            "invoices" => Ok(Self::Invoices),
            "new" => {
                let price = args.next().ok_or(ParseError::Usage("new <price> <name>"))?;
                let name = args.collect::<Vec<_>>().join(" ");
                if name.is_empty() {
                    return Err(ParseError::Usage("new <price> <name>"));
                }
                Ok(Self::New {
                    name,
                    price: parse_number(price)?,
                })
            }
            "del" => args
                .next()
                .map(|id| Self::Delete(ProductId::new(id)))
                .ok_or(ParseError::Usage("del <id>")),
            "void" => args
                .next()
                .map(|id| Self::Void(InvoiceId::new(id)))
                .ok_or(ParseError::Usage("void <invoice-id>")),
            "retry" => Ok(Self::Retry),
            "status" => Ok(Self::Status),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

fn parse_number<T: FromStr>(text: &str) -> Result<T, ParseError> {
    text.parse().map_err(|_| ParseError::Number(text.to_string()))
}

/// Whether the session should keep reading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Run one command against the controller.
///
/// Controller errors are printed, not returned.
///
/// # Errors
///
/// Returns an error only if writing to `out` fails.
pub async fn execute<R, B, W>(
    controller: &mut Controller<R, B>,
    command: Command,
    out: &mut W,
) -> io::Result<Flow>
where
    R: RemoteStore,
    B: CacheBackend,
    W: Write,
{
    match command {
        Command::List => {
            for p in controller.visible_products() {
                writeln!(
                    out,
                    "{:>14}  {:<28} {:>12}  {} {}",
                    p.id.as_str(),
                    p.name,
                    format_vnd(p.price),
                    p.stock,
                    p.unit
                )?;
            }
        }
        Command::Find(term) => {
            controller.set_search(term);
            writeln!(out, "{} product(s) match", controller.visible_products().len())?;
        }
        Command::Add { id, quantity } => match controller.add_to_cart(&id, quantity) {
            Ok(total) => writeln!(out, "{id}: {total} in cart")?,
            Err(e) => writeln!(out, "error: {e}")?,
        },
        Command::Quantity { id, delta } => match controller.adjust_cart(&id, delta) {
            Some(quantity) => writeln!(out, "{id}: {quantity} in cart")?,
            None => writeln!(out, "{id} is not in the cart")?,
        },
        Command::Remove(id) => {
            if !controller.remove_from_cart(&id) {
                writeln!(out, "{id} is not in the cart")?;
            }
        }
        Command::Cart => {
            for item in controller.state().cart.items() {
                writeln!(
                    out,
                    "{:<28} {:>4} x {:>12} = {:>12}",
                    item.product.name,
                    item.quantity,
                    format_vnd(item.product.price),
                    format_vnd(item.line_total())
                )?;
            }
            writeln!(out, "total: {}", format_vnd(controller.cart_total()))?;
        }
        Command::Pay(method) => {
            if let Err(e) = controller.begin_checkout() {
                writeln!(out, "error: {e}")?;
                return Ok(Flow::Continue);
            }
            match controller.checkout(method).await {
                Ok(receipt) => {
                    writeln!(
                        out,
                        "invoice {} ({}): {}",
                        receipt.invoice.id,
                        receipt.invoice.payment_method.label(),
                        format_vnd(receipt.invoice.total)
                    )?;
                    if let Some(url) = receipt.transfer_qr {
                        writeln!(out, "transfer QR: {url}")?;
                    }
                    if let Some(alert) = receipt.alert {
                        writeln!(out, "!! {alert}")?;
                    }
                }
                Err(e) => writeln!(out, "error: {e}")?,
            }
        }
        Command::Close => {
            if controller.close_invoice() {
                writeln!(out, "payment successful")?;
            }
        }
        Command::Invoices => {
            for invoice in controller.invoices() {
                writeln!(
                    out,
                    "{}  {}  {:>12}  {}",
                    invoice.id,
                    invoice.date.format("%d/%m/%Y %H:%M"),
                    format_vnd(invoice.total),
                    invoice.payment_method.label()
                )?;
            }
        }
        Command::New { name, price } => {
            match controller.upsert_product(ProductDraft::new(name, price)).await {
                Ok(outcome) => {
                    writeln!(out, "saved {} ({})", outcome.product.name, outcome.product.id)?;
                    if let Some(alert) = outcome.alert {
                        writeln!(out, "!! {alert}")?;
                    }
                }
                Err(e) => writeln!(out, "error: {e}")?,
            }
        }
        Command::Delete(id) => match controller.delete_product(&id).await {
            Ok(()) => writeln!(out, "deleted {id}")?,
            Err(e) => writeln!(out, "error: {e}")?,
        },
        Command::Void(id) => match controller.delete_invoice(&id).await {
            Ok(()) => writeln!(out, "deleted {id}")?,
            Err(e) => writeln!(out, "error: {e}")?,
        },
        Command::Retry => {
            if controller.retry() {
                writeln!(out, "reconnecting")?;
            } else {
                writeln!(out, "no database configured")?;
            }
        }
        Command::Status => {
            writeln!(out, "backend: {}", controller.health())?;
            if let Some(banner) = controller.banner() {
                writeln!(out, "{}: {}", banner.title, banner.message)?;
                if let Some(link) = banner.link {
                    writeln!(out, "fix: {link}")?;
                }
            }
        }
        Command::Help => writeln!(out, "{HELP}")?,
        Command::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::{LocalCache, MemoryBackend};
    use crate::remote::MemoryRemote;

    #[test]
    fn test_parse_commands() {
        assert_eq!("list".parse::<Command>().unwrap(), Command::List);
        assert_eq!(
            "add 3".parse::<Command>().unwrap(),
            Command::Add {
                id: ProductId::new("3"),
                quantity: 1
            }
        );
        assert_eq!(
            "qty 3 +2".parse::<Command>().unwrap(),
            Command::Quantity {
                id: ProductId::new("3"),
                delta: 2
            }
        );
        assert_eq!(
            "pay transfer".parse::<Command>().unwrap(),
            Command::Pay(PaymentMethod::Transfer)
        );
        assert_eq!(
            "new 12000 Bánh Mì Que".parse::<Command>().unwrap(),
            Command::New {
                name: "Bánh Mì Que".to_string(),
                price: Decimal::from(12_000)
            }
        );
        assert_eq!(
            "find  nước mắm ".parse::<Command>().unwrap(),
            Command::Find("nước mắm".to_string())
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!("pay card".parse::<Command>(), Err(ParseError::Usage(_))));
        assert!(matches!("add 1 many".parse::<Command>(), Err(ParseError::Number(_))));
        assert!(matches!("sing".parse::<Command>(), Err(ParseError::Unknown(_))));
    }

    #[tokio::test]
    async fn test_scripted_session() {
        let mut controller: Controller<MemoryRemote, MemoryBackend> =
            Controller::new(None, LocalCache::new(MemoryBackend::new()));
        controller.start();

        let mut out = Vec::new();
        for line in ["add 1 2", "add 3 3", "cart", "pay cash", "close", "status"] {
            let command = line.parse().unwrap();
            assert_eq!(execute(&mut controller, command, &mut out).await.unwrap(), Flow::Continue);
        }
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("total: 33.500 ₫"));
        assert!(text.contains("payment successful"));
        assert!(text.contains("local only"));

        let mut out = Vec::new();
        assert_eq!(
            execute(&mut controller, Command::Quit, &mut out).await.unwrap(),
            Flow::Quit
        );
    }
}
