fn main() {
    // Vec::try_reserve_exact, which backs every allocation in this crate.
    let is_at_least_1_57 = version_check::is_min_version("1.57.0").unwrap_or(false);

    if !is_at_least_1_57 {
        println!("cargo:warning=denseslot requires rustc >= 1.57.0");
    }
}
