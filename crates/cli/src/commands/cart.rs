use std::io::Write;

use bikeshop_storefront::CartStore;

/// Print every line followed by the totals.
pub fn show(cart: &CartStore, out: &mut impl Write) -> std::io::Result<()> {
    let lines = cart.lines();
    if lines.is_empty() {
        return writeln!(out, "Cart is empty");
    }

    for line in &lines {
        let total = line
            .line_total()
            .map_or_else(|| "overflow".to_string(), |p| p.to_string());
        writeln!(
            out,
            "[{}] #{} {} x{} @ {} = {}",
            line.id, line.product_id, line.product.name, line.quantity, line.product.price, total
        )?;
    }

    let subtotal = cart
        .subtotal()
        .map_or_else(|| "overflow".to_string(), |p| p.to_string());
    writeln!(out, "{} item(s), subtotal {subtotal}", cart.item_count())
}
