use reviewclean_formats::{write_dataset, Dataset, Record};

fn review(
    line: usize,
    product: &str,
    user: Option<&str>,
    rating: Option<&str>,
    title: &str,
    content: &str,
) -> Record {
    Record::from_pairs(
        [
            ("product_id", Some(product)),
            ("product_name", Some("Sample Cable")),
            ("actual_price", Some("₹1,099")),
            ("discounted_price", Some("₹399")),
            ("discount_percentage", Some("64%")),
            ("rating", rating),
            ("rating_count", Some("24,269")),
            ("about_product", Some("Fast charging | 1m braided cable")),
            ("user_id", user),
            ("review_id", Some("R1")),
            ("review_title", Some(title)),
            ("review_content", Some(content)),
            ("product_link", Some("https://example.com/p/P1")),
        ],
        line,
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_file = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/tmp/test_reviews.csv".to_string());

    println!("🔧 Generating test reviews: {}\n", output_file);
    let mut records = Vec::new();

    // Exact duplicates after normalization
    println!("Adding duplicate reviews...");
    records.push(review(1, "P1", Some("U1"), Some("4.2"), "Great", "Great product!"));
    records.push(review(2, "P1", Some("U1"), Some("4.2"), "Great", "great   PRODUCT"));
    records.push(review(3, "P1", Some("U1"), Some("4.2"), "Great", "<b>Great product</b>"));

    // Markup and links
    println!("Adding markup and links...");
    records.push(review(4, "P2", Some("U2"), Some("3.9"), "Ok", "<b>Visit http://x.com NOW!!</b>"));
    records.push(review(5, "P2", Some("U3"), Some("5.0"), "Love it", "Works well, see www.example.com"));

    // Mixed-language content
    println!("Adding mixed-language reviews...");
    records.push(review(6, "P3", Some("U4"), Some("4.0"), "Nice", "great product बहुत अच्छा"));
    records.push(review(7, "P3", Some("U5"), Some("3.0"), "ठीक है", "बहुत अच्छा है"));

    // Rating edge cases
    println!("Adding rating edge cases...");
    records.push(review(8, "P4", Some("U6"), Some("|"), "Hmm", "Rating is garbled"));
    records.push(review(9, "P4", Some("U7"), None, "Hmm", "No rating at all"));
    records.push(review(10, "P4", Some("U8"), Some("2.999"), "Bad", "Stopped working in a week"));
    records.push(review(11, "P4", Some("U9"), Some("0.5"), "Odd", "Out of range rating"));

    // Null business keys
    println!("Adding null user ids...");
    records.push(review(12, "P5", None, Some("4.5"), "Good", "Anonymous review one"));
    records.push(review(13, "P5", Some("  "), Some("4.5"), "Good", "Anonymous review two"));

    // Unique reviews
    println!("Adding unique reviews...");
    let texts = [
        "Charges my phone quickly",
        "The cable feels sturdy and well made",
        "Decent value for the price",
        "Stopped charging after a month",
        "Exactly as described, fast delivery",
    ];
    for (i, text) in texts.iter().enumerate() {
        let user = format!("U{}", 20 + i);
        records.push(review(14 + i, "P6", Some(user.as_str()), Some("4.1"), "Review", text));
    }

    let total = records.len();
    let dataset = Dataset::from_records(records);
    write_dataset(&output_file, &dataset, None)?;

    println!("\n✓ Generated test dataset with {} reviews", total);
    println!("  - Duplicates after normalization: 2");
    println!("  - Mixed-language fields: 2");
    println!("  - Invalid or missing ratings: 2");
    println!("  - Out-of-range ratings: 1");
    println!("  - Null user ids: 2");
    println!("\nRun the pipeline with:");
    println!("  reviewclean profile {}", output_file);
    println!("  reviewclean run -i {} -o /tmp/clean_reviews.csv --observe-only", output_file);

    Ok(())
}
