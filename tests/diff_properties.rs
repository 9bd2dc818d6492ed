use std::collections::BTreeSet;

use outfit_tracker_lib::application::NotificationBuilder;
use outfit_tracker_lib::domain::{
    ParseParams, Product, ProductDiff, ProductOption, ProductPriceOptions, ProductSize, SizeFilter,
    Tracking, TrackingFlags, VendorType, apply_discount,
};
use outfit_tracker_lib::infrastructure::parsing::SizeSelection;
use proptest::prelude::*;

const URL: &str = "https://www.lamoda.ru/p/mp002xm0vq4k/";
const SIZES: [&str; 6] = ["XS", "S", "M", "L", "XL", "XXL"];

fn size_strategy() -> impl Strategy<Value = &'static str> {
    proptest::sample::select(SIZES.to_vec())
}

/// `(size, quantity, price)` rows with distinct sizes.
fn options_strategy() -> impl Strategy<Value = Vec<(&'static str, i64, i64)>> {
    proptest::collection::btree_map(size_strategy(), (0i64..20, 1i64..50_000), 0..SIZES.len())
        .prop_map(|rows| {
            rows.into_iter()
                .map(|(size, (quantity, price))| (size, quantity, price))
                .collect()
        })
}

fn product(options: &[(&str, i64, i64)]) -> Product {
    let mut product = Product::new(URL, VendorType::Lamoda);
    product.brand = "Brand".to_string();
    product.options = options
        .iter()
        .map(|(size, quantity, price)| {
            ProductOption::new(
                URL,
                ProductSize::plain(*size),
                *quantity,
                ProductPriceOptions::undiscounted(*price),
            )
        })
        .collect();
    product
}

proptest! {
    #[test]
    fn identical_snapshots_never_notify(options in options_strategy(), with_optional in any::<bool>()) {
        let snapshot = product(&options);
        let diff = ProductDiff::between(&snapshot, &snapshot);
        let tracking = Tracking::new(
            ParseParams::new(URL),
            1,
            snapshot.clone(),
            TrackingFlags { with_optional },
        );

        let result = NotificationBuilder::new(1)
            .tracking(tracking)
            .product(snapshot)
            .diff(diff)
            .build_diff_message();

        prop_assert!(!result.is_sendable);
    }

    #[test]
    fn stock_flags_follow_quantities(
        stored_qty in -2i64..20,
        fresh_qty in -2i64..20,
        stored_price in 1i64..10_000,
        fresh_price in 1i64..10_000,
    ) {
        let diff = ProductDiff::between(
            &product(&[("M", stored_qty, stored_price)]),
            &product(&[("M", fresh_qty, fresh_price)]),
        );

        prop_assert_eq!(diff.options.len(), 1);
        let option = &diff.options[0];

        prop_assert_eq!(option.stock.is_come_to_in_stock, fresh_qty > 0 && stored_qty <= 0);
        prop_assert_eq!(option.stock.is_sell_up, fresh_qty <= 5 && fresh_qty < stored_qty);
        prop_assert_eq!(option.stock.is_available, fresh_qty > 0);
        prop_assert_eq!(option.price.is_lower, stored_price > fresh_price);
        prop_assert_eq!(option.price.is_higher, stored_price < fresh_price);
        prop_assert!(!(option.price.is_lower && option.price.is_higher));
    }

    #[test]
    fn diff_covers_only_sizes_present_in_both(stored in options_strategy(), fresh in options_strategy()) {
        let diff = ProductDiff::between(&product(&stored), &product(&fresh));

        let stored_sizes: BTreeSet<&str> = stored.iter().map(|(size, _, _)| *size).collect();
        let expected: Vec<&str> = fresh
            .iter()
            .map(|(size, _, _)| *size)
            .filter(|size| stored_sizes.contains(size))
            .collect();
        let actual: Vec<&str> = diff.options.iter().map(|option| option.size.base.value.as_str()).collect();

        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn size_selection_splits_found_and_missing(
        requested in proptest::collection::vec(size_strategy(), 0..8),
        listed in proptest::collection::btree_set(size_strategy(), 0..SIZES.len()),
    ) {
        let mut selection = SizeSelection::new(&SizeFilter::new(requested.iter().copied()));
        let mut found = Vec::new();
        for size in &listed {
            if selection.accepts(size) {
                selection.mark_found(size);
                found.push(*size);
            }
        }
        let missing: Vec<String> = selection
            .not_found_options()
            .iter()
            .map(|option| option.size.label())
            .collect();

        let requested_set: BTreeSet<&str> = requested.iter().copied().collect();
        if requested.is_empty() {
            prop_assert_eq!(found, listed.iter().copied().collect::<Vec<_>>());
            prop_assert!(missing.is_empty());
        } else {
            let expected_found: Vec<&str> = listed.iter().copied().filter(|size| requested_set.contains(size)).collect();
            prop_assert_eq!(found, expected_found);

            let mut expected_missing = Vec::new();
            for size in &requested {
                if !listed.contains(size) && !expected_missing.contains(&size.to_string()) {
                    expected_missing.push(size.to_string());
                }
            }
            prop_assert_eq!(missing, expected_missing);
        }
    }

    #[test]
    fn discount_never_raises_the_price(base in 0i64..1_000_000, percent in -10i64..120) {
        let discounted = apply_discount(base, percent);
        prop_assert!(discounted <= base);
        prop_assert!(discounted >= 0);
    }
}
