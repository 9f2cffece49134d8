use std::time::Instant;

use polycubes::{cache, known_count, Enumerator, Symmetry};

use crate::{finish_bar, make_bar, spinner_bar, EnumerateOpts, PrintOpts};

/// Print the amount of shapes for every level up to `n`.
fn enumerate_all(enumerator: &Enumerator, n: usize) {
    for set in enumerator.generate_up_to(n) {
        let known = match (set.symmetry(), known_count(set.n())) {
            (Symmetry::Rotation, Some(known)) => format!(" (known: {known})"),
            _ => String::new(),
        };
        println!("N = {}: {}{known}", set.n(), set.len());
    }
}

pub fn enumerate(opts: &EnumerateOpts) {
    let n = opts.n;
    let symmetry: Symmetry = opts.mode.into();

    let start = Instant::now();

    let bar = make_bar(0);
    let enumerator = opts.enumerator().with_progress(bar.clone());

    println!(
        "Enumerating N = {n} with {} worker(s), unique under {symmetry}",
        enumerator.workers()
    );

    if opts.all {
        enumerate_all(&enumerator, n);
        bar.finish_and_clear();
        println!("Duration: {} ms", start.elapsed().as_millis());
        return;
    }

    let cubes = if opts.no_cache {
        enumerator.generate(n)
    } else {
        if !opts.cache_dir.is_dir() {
            if let Err(e) = std::fs::create_dir_all(&opts.cache_dir) {
                println!(
                    "Could not create cache directory {}: {e}",
                    opts.cache_dir.display()
                );
            }
        }

        cache::generate_cached(&enumerator, n, &opts.cache_dir, opts.compression.into())
    };

    let duration = start.elapsed();
    finish_bar(&bar, duration, cubes.len(), n);

    println!("Unique polycubes found for N = {n}: {}.", cubes.len());
    println!("Duration: {} ms", duration.as_millis());

    if symmetry == Symmetry::Rotation {
        match known_count(n) {
            Some(known) if known == cubes.len() as u64 => {
                println!("Matches the known count for N = {n}.")
            }
            Some(known) => println!("Known count for N = {n} is {known}!"),
            None => {}
        }
    }
}

/// Print every shape as a list of coordinates, ordered by canonical key,
/// followed by the amount of shapes printed.
pub fn print(opts: &PrintOpts) {
    let bar = spinner_bar();
    let enumerator = Enumerator::new()
        .with_symmetry(opts.mode.into())
        .with_progress(bar.clone());

    let levels = if opts.all {
        enumerator.generate_up_to(opts.n)
    } else {
        vec![enumerator.generate(opts.n)]
    };
    bar.finish_and_clear();

    let mut total = 0;
    for set in &levels {
        for shape in set.sorted() {
            println!("{:?}", shape.to_triples());
        }
        total += set.len();
    }

    println!("{total}");
}
