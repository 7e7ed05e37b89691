//! Parse and print throughput over a synthetic page.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use schemdiff::sexp::{parse, print_file};

fn synthetic_page(wires: usize) -> String {
    let mut src = String::from(
        "(kicad_sch\n\t(version 20231120)\n\t(generator \"eeschema\")\n\t(paper \"A4\")\n",
    );
    for i in 0..wires {
        src.push_str(&format!(
            "\t(wire (pts (xy {i}.54 10) (xy {i}.54 20)) (uuid \"w-{i}\"))\n"
        ));
        src.push_str(&format!("\t(label \"NET_{i}\" (at {i}.54 10 0))\n"));
    }
    src.push_str(")\n");
    src
}

fn bench_parse_print(c: &mut Criterion) {
    let src = synthetic_page(500);
    c.bench_function("parse_page_500_wires", |b| {
        b.iter(|| parse(black_box(&src)).expect("parses"));
    });
    let tree = parse(&src).expect("parses");
    c.bench_function("print_page_500_wires", |b| {
        b.iter(|| print_file(black_box(&tree), tree.root()));
    });
    c.bench_function("roundtrip_page_500_wires", |b| {
        b.iter(|| {
            let t = parse(black_box(&src)).expect("parses");
            print_file(&t, t.root())
        });
    });
}

criterion_group!(benches, bench_parse_print);
criterion_main!(benches);
