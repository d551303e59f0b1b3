//! Harness for Tom Harte's `SingleStepTests` Z80 fixtures.
//!
//! Each JSON file holds 1,000 cases for one opcode: an initial CPU/RAM
//! state, the expected final state, and the bus cycle list. The harness
//! steps one instruction and compares registers, RAM, and the T-state
//! count against the cycle list length.
//!
//! MEMPTR (`wz`) and the Q register are not modelled by this core, so those
//! fields are parsed but not compared. Fixtures live in `test-data/z80/v1/`
//! at the workspace root.

use cpu_z80::{Bus, MemRead, Z80};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

struct TestBus {
    ram: Vec<u8>,
    io_read_values: HashMap<u16, u8>,
}

impl TestBus {
    fn new() -> Self {
        Self {
            ram: vec![0; 0x10000],
            io_read_values: HashMap::new(),
        }
    }
}

impl Bus for TestBus {
    fn read(&mut self, addr: u16) -> MemRead {
        MemRead::new(self.ram[usize::from(addr)])
    }

    fn write(&mut self, addr: u16, value: u8) -> u8 {
        self.ram[usize::from(addr)] = value;
        0
    }

    fn port_in(&mut self, port: u16) -> u8 {
        self.io_read_values.get(&port).copied().unwrap_or(0xFF)
    }

    fn port_out(&mut self, _port: u16, _value: u8) {}
}

#[derive(Deserialize)]
struct TestCase {
    name: String,
    initial: CpuState,
    #[serde(rename = "final")]
    final_state: CpuState,
    cycles: Vec<serde_json::Value>,
    #[serde(default)]
    ports: Vec<(u16, u8, String)>,
}

#[derive(Deserialize)]
#[allow(dead_code)] // wz/q/p are parsed but not modelled
struct CpuState {
    pc: u16,
    sp: u16,
    a: u8,
    b: u8,
    c: u8,
    d: u8,
    e: u8,
    f: u8,
    h: u8,
    l: u8,
    i: u8,
    r: u8,
    ix: u16,
    iy: u16,
    wz: u16,
    #[serde(rename = "af_")]
    af_alt: u16,
    #[serde(rename = "bc_")]
    bc_alt: u16,
    #[serde(rename = "de_")]
    de_alt: u16,
    #[serde(rename = "hl_")]
    hl_alt: u16,
    iff1: u8,
    iff2: u8,
    im: u8,
    ei: u8,
    p: u8,
    q: u8,
    ram: Vec<(u16, u8)>,
}

fn setup(cpu: &mut Z80, bus: &mut TestBus, state: &CpuState, ports: &[(u16, u8, String)]) {
    for &(addr, value) in &state.ram {
        bus.ram[usize::from(addr)] = value;
    }
    for &(port, value, ref dir) in ports {
        if dir == "r" {
            bus.io_read_values.insert(port, value);
        }
    }

    cpu.regs.a = state.a;
    cpu.regs.f = state.f;
    cpu.regs.b = state.b;
    cpu.regs.c = state.c;
    cpu.regs.d = state.d;
    cpu.regs.e = state.e;
    cpu.regs.h = state.h;
    cpu.regs.l = state.l;

    cpu.regs.a_alt = (state.af_alt >> 8) as u8;
    cpu.regs.f_alt = state.af_alt as u8;
    cpu.regs.b_alt = (state.bc_alt >> 8) as u8;
    cpu.regs.c_alt = state.bc_alt as u8;
    cpu.regs.d_alt = (state.de_alt >> 8) as u8;
    cpu.regs.e_alt = state.de_alt as u8;
    cpu.regs.h_alt = (state.hl_alt >> 8) as u8;
    cpu.regs.l_alt = state.hl_alt as u8;

    cpu.regs.ix = state.ix;
    cpu.regs.iy = state.iy;
    cpu.regs.sp = state.sp;
    cpu.regs.pc = state.pc;
    cpu.regs.i = state.i;
    cpu.regs.r = state.r;

    cpu.regs.iff1 = state.iff1 != 0;
    cpu.regs.iff2 = state.iff2 != 0;
    cpu.regs.im = state.im;
}

fn compare(cpu: &Z80, bus: &TestBus, expected: &CpuState, tstates: u32, cycles: usize) -> Vec<String> {
    let mut errors = Vec::new();

    let mut check_u8 = |name: &str, actual: u8, want: u8| {
        if actual != want {
            errors.push(format!("{name}: got ${actual:02X}, want ${want:02X}"));
        }
    };

    check_u8("A", cpu.regs.a, expected.a);
    check_u8("F", cpu.regs.f, expected.f);
    check_u8("B", cpu.regs.b, expected.b);
    check_u8("C", cpu.regs.c, expected.c);
    check_u8("D", cpu.regs.d, expected.d);
    check_u8("E", cpu.regs.e, expected.e);
    check_u8("H", cpu.regs.h, expected.h);
    check_u8("L", cpu.regs.l, expected.l);
    check_u8("I", cpu.regs.i, expected.i);
    check_u8("R", cpu.regs.r, expected.r);
    check_u8("IM", cpu.regs.im, expected.im);

    let mut check_u16 = |name: &str, actual: u16, want: u16| {
        if actual != want {
            errors.push(format!("{name}: got ${actual:04X}, want ${want:04X}"));
        }
    };

    check_u16("PC", cpu.regs.pc, expected.pc);
    check_u16("SP", cpu.regs.sp, expected.sp);
    check_u16("IX", cpu.regs.ix, expected.ix);
    check_u16("IY", cpu.regs.iy, expected.iy);
    check_u16(
        "AF'",
        (u16::from(cpu.regs.a_alt) << 8) | u16::from(cpu.regs.f_alt),
        expected.af_alt,
    );
    check_u16(
        "BC'",
        (u16::from(cpu.regs.b_alt) << 8) | u16::from(cpu.regs.c_alt),
        expected.bc_alt,
    );
    check_u16(
        "DE'",
        (u16::from(cpu.regs.d_alt) << 8) | u16::from(cpu.regs.e_alt),
        expected.de_alt,
    );
    check_u16(
        "HL'",
        (u16::from(cpu.regs.h_alt) << 8) | u16::from(cpu.regs.l_alt),
        expected.hl_alt,
    );

    if u8::from(cpu.regs.iff1) != expected.iff1 {
        errors.push(format!("IFF1: got {}, want {}", u8::from(cpu.regs.iff1), expected.iff1));
    }
    if u8::from(cpu.regs.iff2) != expected.iff2 {
        errors.push(format!("IFF2: got {}, want {}", u8::from(cpu.regs.iff2), expected.iff2));
    }

    for &(addr, want) in &expected.ram {
        let actual = bus.ram[usize::from(addr)];
        if actual != want {
            errors.push(format!("RAM[${addr:04X}]: got ${actual:02X}, want ${want:02X}"));
        }
    }

    if tstates as usize != cycles {
        errors.push(format!("T-states: got {tstates}, want {cycles}"));
    }

    errors
}

#[test]
#[ignore = "requires test-data/z80 fixtures - run with --ignored"]
fn run_all() {
    let test_dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(Path::parent)
        .expect("workspace root")
        .join("test-data/z80/v1");

    if !test_dir.exists() {
        eprintln!("Test data not found at {}", test_dir.display());
        return;
    }

    let mut filenames: Vec<String> = Vec::new();
    for opcode in 0..=0xFFu8 {
        if !matches!(opcode, 0xCB | 0xDD | 0xED | 0xFD) {
            filenames.push(format!("{opcode:02x}.json"));
        }
    }
    for prefix in ["cb", "dd", "ed", "fd", "dd cb __", "fd cb __"] {
        for opcode in 0..=0xFFu8 {
            filenames.push(format!("{prefix} {opcode:02x}.json"));
        }
    }

    let mut total_pass = 0u64;
    let mut total_fail = 0u64;

    for filename in &filenames {
        let path = test_dir.join(filename);
        if !path.exists() {
            continue;
        }

        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
        let tests: Vec<TestCase> = serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse {}: {e}", path.display()));

        let mut file_fail = 0u32;
        let mut first_failures: Vec<String> = Vec::new();

        for test in &tests {
            let mut cpu = Z80::new();
            let mut bus = TestBus::new();
            setup(&mut cpu, &mut bus, &test.initial, &test.ports);

            let tstates = cpu.step(&mut bus);
            let errors = compare(&cpu, &bus, &test.final_state, tstates, test.cycles.len());

            if errors.is_empty() {
                total_pass += 1;
            } else {
                total_fail += 1;
                file_fail += 1;
                if first_failures.len() < 5 {
                    first_failures.push(format!("  FAIL [{}]: {}", test.name, errors.join(", ")));
                }
            }
        }

        if file_fail > 0 {
            println!("{filename}: {file_fail}/{} failed", tests.len());
            for msg in &first_failures {
                println!("{msg}");
            }
        }
    }

    println!("pass: {total_pass}, fail: {total_fail}");
    assert_eq!(total_fail, 0, "{total_fail} single-step cases failed");
}
