use anyhow::Context;
use stripe_map::{Error, StripedHashMap};

fn price_of(prices: &StripedHashMap<&'static str, u32>, item: &str) -> anyhow::Result<u32> {
    let price = prices
        .get(item)
        .with_context(|| format!("no price for {item}"))?;
    Ok(price)
}

#[test]
fn lookups_propagate_with_question_mark() -> anyhow::Result<()> {
    let prices = StripedHashMap::new();
    prices.insert("apple", 120);
    prices.insert("pear", 95);

    assert_eq!(price_of(&prices, "apple")? + price_of(&prices, "pear")?, 215);

    let err = price_of(&prices, "plum").unwrap_err();
    assert_eq!(err.to_string(), "no price for plum");
    assert_eq!(err.downcast_ref::<Error>(), Some(&Error::KeyNotFound));
    Ok(())
}

#[test]
fn copy_to_errors_describe_the_problem() -> anyhow::Result<()> {
    let map = (0..4u8).map(|i| (i, i)).collect::<StripedHashMap<_, _>>();
    let mut dest = vec![(0, 0); 4];

    assert_eq!(map.copy_to(&mut dest, 0)?, 4);

    let too_small = map.copy_to(&mut dest, 1).unwrap_err();
    assert_eq!(
        too_small.to_string(),
        "The destination has room for 3 entries after the offset, but the map holds 4 entries"
    );

    let out_of_range = map.copy_to(&mut dest, 5).unwrap_err();
    assert_eq!(
        out_of_range.to_string(),
        "The offset 5 is out of range for a destination of length 4"
    );
    Ok(())
}
