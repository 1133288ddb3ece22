//! Seed commands.
//!
//! Product files are YAML lists of [`ProductSeed`]; products are matched by
//! SKU so a file can be re-applied to update prices and stock.

use std::collections::HashSet;
use std::path::Path;

use tracing::{error, info};

use bazaar_core::Email;
use bazaar_core::pricing::discounted_unit_price;
use bazaar_storefront::db::{ProductRepository, UserRepository};
use bazaar_storefront::models::ProductSeed;

use super::connect;

/// Check a parsed seed file before touching the database.
///
/// Returns one message per problem found.
pub fn validate_products(seeds: &[ProductSeed]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, seed) in seeds.iter().enumerate() {
        let label = if seed.sku.trim().is_empty() {
            format!("entry {}", index + 1)
        } else {
            seed.sku.clone()
        };

        if seed.sku.trim().is_empty() {
            errors.push(format!("{label}: sku is required"));
        } else if !seen.insert(seed.sku.as_str()) {
            errors.push(format!("{label}: duplicate sku"));
        }
        if seed.title.trim().is_empty() {
            errors.push(format!("{label}: title is required"));
        }
        if let Err(e) = discounted_unit_price(seed.price, seed.discount_percentage) {
            errors.push(format!("{label}: {e}"));
        }
        if seed.stock < 0 {
            errors.push(format!("{label}: stock cannot be negative"));
        }
    }

    errors
}

/// Insert or update products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, validation fails,
/// or a database write fails.
pub async fn products(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading products from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let seeds: Vec<ProductSeed> = serde_yaml::from_str(&content)?;
    info!(products = seeds.len(), "Parsed seed file");

    let errors = validate_products(&seeds);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = connect().await?;
    let repo = ProductRepository::new(&pool);

    for seed in &seeds {
        let product = repo.upsert_seed(seed).await?;
        info!(
            id = %product.id,
            sku = %product.sku,
            price = %product.price,
            stock = product.stock,
            "Upserted product"
        );
    }

    info!("Seeding complete! {} products", seeds.len());
    Ok(())
}

/// Create a user, or update an existing user's name.
///
/// # Errors
///
/// Returns an error if the email is invalid or the database write fails.
pub async fn user(email: &str, name: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let email = Email::parse(email)?;

    let pool = connect().await?;
    let user = UserRepository::new(&pool).ensure(&email, name).await?;

    info!(id = %user.id, email = %user.email, "User ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn seed(sku: &str, price: rust_decimal::Decimal, discount: rust_decimal::Decimal) -> ProductSeed {
        ProductSeed {
            sku: sku.to_string(),
            title: format!("Product {sku}"),
            price,
            discount_percentage: discount,
            stock: 5,
        }
    }

    #[test]
    fn test_valid_file_has_no_errors() {
        let seeds = [seed("TEA-1", dec!(500), dec!(10)), seed("TEA-2", dec!(0), dec!(0))];
        assert!(validate_products(&seeds).is_empty());
    }

    #[test]
    fn test_duplicate_and_invalid_entries_are_reported() {
        let mut no_title = seed("TEA-3", dec!(10), dec!(0));
        no_title.title = " ".to_string();
        let mut negative_stock = seed("TEA-4", dec!(10), dec!(0));
        negative_stock.stock = -1;

        let seeds = [
            seed("TEA-1", dec!(500), dec!(10)),
            seed("TEA-1", dec!(500), dec!(10)),
            seed("TEA-2", dec!(100), dec!(150)),
            no_title,
            negative_stock,
            seed("", dec!(1), dec!(0)),
        ];
        let errors = validate_products(&seeds);

        assert_eq!(errors.len(), 5);
        assert!(errors[0].contains("duplicate sku"));
        assert!(errors[1].starts_with("TEA-2"));
        assert!(errors[4].starts_with("entry 6"));
    }

    #[test]
    fn test_yaml_defaults() {
        let seeds: Vec<ProductSeed> = serde_yaml::from_str(
            "- sku: TEA-ASSAM-250\n  title: Assam Tea 250g\n  price: \"500.00\"\n",
        )
        .expect("parse");

        assert_eq!(seeds[0].price, dec!(500.00));
        assert!(seeds[0].discount_percentage.is_zero());
        assert_eq!(seeds[0].stock, 0);
    }
}
