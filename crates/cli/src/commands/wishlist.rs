use std::io::Write;

use bikeshop_storefront::WishlistStore;

pub fn show(wishlist: &WishlistStore, out: &mut impl Write) -> std::io::Result<()> {
    let entries = wishlist.entries();
    if entries.is_empty() {
        return writeln!(out, "Wishlist is empty");
    }
    for entry in &entries {
        writeln!(
            out,
            "#{} {} {}",
            entry.product_id, entry.product.name, entry.product.price
        )?;
    }
    Ok(())
}
