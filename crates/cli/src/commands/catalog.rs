//! Catalog commands: product detail, browsing and search.

use std::io::Write;

use bikeshop_core::{Product, ProductId};
use bikeshop_storefront::ClientState;
use bikeshop_storefront::api::ProductFilter;

fn summary(out: &mut impl Write, product: &Product) -> std::io::Result<()> {
    let stock = if product.in_stock() {
        format!("{} in stock", product.stock)
    } else {
        "out of stock".to_string()
    };
    writeln!(
        out,
        "#{} {} ({}) {} - {stock}",
        product.id, product.name, product.brand, product.price
    )
}

pub async fn product(
    state: &ClientState,
    out: &mut impl Write,
    id: ProductId,
) -> Result<(), Box<dyn std::error::Error>> {
    let product = state.product(id).await?;
    summary(out, &product)?;
    if !product.description.is_empty() {
        writeln!(out, "  {}", product.description)?;
    }
    if !product.colors.is_empty() {
        writeln!(out, "  colors: {}", product.colors.join(", "))?;
    }
    for attribute in &product.attributes {
        writeln!(out, "  {}: {}", attribute.name, attribute.value)?;
    }
    if let Some(image) = product.primary_image() {
        writeln!(out, "  image: {image}")?;
    }
    Ok(())
}

fn page_footer(
    out: &mut impl Write,
    page: u32,
    total_pages: u32,
    has_more: bool,
) -> std::io::Result<()> {
    writeln!(
        out,
        "Page {} of {}{}",
        page + 1,
        total_pages,
        if has_more { " (more available)" } else { "" }
    )
}

/// Show one zero-based page of the catalog matching `filter`.
pub async fn browse(
    state: &ClientState,
    out: &mut impl Write,
    filter: &ProductFilter,
    page: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let listing = state.browse(filter, page).await?;

    if listing.products.is_empty() {
        writeln!(out, "No products found")?;
        return Ok(());
    }
    for product in &listing.products {
        summary(out, product)?;
    }
    page_footer(out, listing.page, listing.total_pages, listing.has_more())?;
    Ok(())
}

/// Run a search and load up to `pages` pages.
pub async fn search(
    state: &ClientState,
    out: &mut impl Write,
    keyword: &str,
    pages: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let search = state.search();
    let mut results = search.search_now(keyword).await?;
    for _ in 1..pages {
        if !results.has_more {
            break;
        }
        search.load_more().await?;
        results = search.results();
    }

    if results.products.is_empty() {
        writeln!(out, "No products found")?;
        return Ok(());
    }
    for product in &results.products {
        summary(out, product)?;
    }
    page_footer(out, results.page, results.total_pages, results.has_more)?;
    Ok(())
}
