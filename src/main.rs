//! i8080 Emulator - CLI Entry Point
//!
//! Commands:
//! - `i8080-emu run <image>` - Run a flat binary image
//! - `i8080-emu test` - Run the built-in self-test

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "i8080-emu")]
#[command(version = "0.1.0")]
#[command(about = "An instruction-level emulator of the Intel 8080's documented subset")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a binary image until it halts
    Run {
        /// Path to the flat binary image to execute
        image: String,
        /// Load origin (decimal or 0x-prefixed hex)
        #[arg(short, long, default_value = "0", value_parser = parse_address)]
        org: u16,
        /// Maximum number of instructions to run (default: 10000)
        #[arg(short, long, default_value = "10000")]
        max_cycles: u64,
        /// Show trace output
        #[arg(short, long)]
        trace: bool,
        /// Print the final machine state as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Run the built-in self-test
    Test,
}

fn parse_address(s: &str) -> Result<u16, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { image, org, max_cycles, trace, json }) => {
            run_image(&image, org, max_cycles, trace, json);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("i8080 Emulator v0.1.0");
            println!("An instruction-level Intel 8080 emulator");
            println!();
            println!("Use --help for available commands");
            println!();
            demo_byte_primitives();
        }
    }
}

fn run_image(path: &str, org: u16, max_cycles: u64, trace: bool, json: bool) {
    use i8080::Cpu;

    println!("🔧 Running: {}", path);

    let image = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    if image.is_empty() {
        eprintln!("❌ Empty image, nothing to execute");
        std::process::exit(1);
    }

    println!("📂 Loaded {} bytes at 0x{:04X}", image.len(), org);

    let mut cpu = Cpu::new();
    if let Err(e) = cpu.load_program(org, &image) {
        eprintln!("❌ Failed to load image: {}", e);
        std::process::exit(1);
    }
    cpu.regs.pc.set(org);

    println!();
    println!("━━━ Execution ━━━");

    let mut cycles = 0u64;
    while cpu.is_running() && cycles < max_cycles {
        let pc = cpu.regs.pc.get();

        match cpu.step() {
            Ok(instr) => {
                if trace {
                    println!(
                        "{:04X}: {}  A={:02X} {:?}",
                        pc,
                        instr,
                        cpu.regs.a.get(),
                        cpu.regs.flags
                    );
                }
                cycles += 1;
            }
            Err(e) => {
                eprintln!("❌ CPU error at PC=0x{:04X}: {}", pc, e);
                std::process::exit(1);
            }
        }
    }

    println!();
    if json {
        let summary = serde_json::json!({
            "cycles": cycles,
            "state": cpu.state,
            "registers": cpu.regs,
            "leds": cpu.leds().to_string(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("❌ Failed to serialize state: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        println!("━━━ Result ━━━");
        println!("Cycles: {}", cycles);
        println!("State: {:?}", cpu.state);
        println!("A:  0x{:02X}", cpu.regs.a.get());
        println!("BC: 0x{:04X}", cpu.regs.bc());
        println!("DE: 0x{:04X}", cpu.regs.de());
        println!("HL: 0x{:04X}", cpu.regs.hl());
        println!("PC: 0x{:04X}", cpu.regs.pc.get());
        println!("SP: 0x{:04X}", cpu.regs.sp.get());
        println!("Flags: {:?}", cpu.regs.flags);
        println!("LEDs: {}", cpu.leds());
    }

    if cycles >= max_cycles {
        println!();
        println!(
            "⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.",
            max_cycles
        );
    }
}

fn demo_byte_primitives() {
    use i8080::bits::{arith, ByteCell, Word16};

    println!("━━━ 8080 Primitives Demo ━━━");
    println!();

    println!("ByteCell (8-bit register cell):");
    let mut a = ByteCell::new(0x5A);
    println!("  0x5A = {:?}", a);
    a.complement();
    println!("  complemented: {:?}", a);
    println!();

    println!("Parity (even number of one bits):");
    for value in [0x00u8, 0x01, 0x03] {
        println!("  parity(0x{:02X}) = {}", value, arith::parity(value));
    }
    println!();

    println!("Word16 wraparound:");
    let mut pc = Word16::new(0xFFFF);
    let before = pc.advance();
    println!("  0x{:04X} + 1 = 0x{:04X}", before, pc.get());
    println!();

    println!("✓ Core primitives working!");
}

fn run_self_test() {
    use i8080::bits::arith;
    use i8080::cpu::{decode, encode, Instruction};
    use i8080::{Cpu, Flag};

    println!("━━━ i8080 Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    // Test 1: parity of every byte matches its bit count
    print!("Parity correctness... ");
    let mut ok = true;
    for value in 0..=255u8 {
        if arith::parity(value) != (value.count_ones() % 2 == 0) {
            ok = false;
            break;
        }
    }
    if ok { println!("✓"); passed += 1; }
    else { println!("✗"); failed += 1; }

    // Test 2: encode/decode roundtrip for the register families
    print!("Decode roundtrip... ");
    ok = true;
    for opcode in [0x04u8, 0x3C, 0x0D, 0x34, 0xC5, 0xF1, 0x09, 0xCF] {
        if encode(&decode(opcode)) != opcode {
            ok = false;
            break;
        }
    }
    if ok { println!("✓"); passed += 1; }
    else { println!("✗"); failed += 1; }

    // Test 3: halt stops the machine
    print!("CPU halt instruction... ");
    let mut cpu = Cpu::new();
    cpu.load_program(0, &[encode(&Instruction::Halt)]).unwrap();
    let result = cpu.run();
    if result.is_ok() && cpu.is_halted() {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    // Test 4: INR B wraps 0xFF to zero with Zero and Parity set
    print!("Increment wraparound... ");
    let mut cpu = Cpu::new();
    cpu.load_program(0, &[0x04, 0x76]).unwrap();
    cpu.regs.b.set(0xFF);
    cpu.run().unwrap();
    if cpu.regs.b.get() == 0 && cpu.regs.flags.get(Flag::Zero) && cpu.regs.flags.get(Flag::Parity)
    {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ (B={:02X}, {:?})", cpu.regs.b.get(), cpu.regs.flags);
        failed += 1;
    }

    // Test 5: DAA adjusts 0xA4 to 0x04 with carry
    print!("Decimal adjust... ");
    let mut cpu = Cpu::new();
    cpu.load_program(0, &[0x27, 0x76]).unwrap();
    cpu.regs.a.set(0xA4);
    cpu.run().unwrap();
    if cpu.regs.a.get() == 0x04 && cpu.regs.flags.get(Flag::Carry) {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ (A={:02X})", cpu.regs.a.get());
        failed += 1;
    }

    // Test 6: push/pop moves a value between pairs
    print!("Stack push/pop... ");
    let mut cpu = Cpu::new();
    cpu.load_program(0, &[0xC5, 0xD1, 0x76]).unwrap();
    cpu.regs.sp.set(0x0100);
    cpu.regs.bc_mut().set(0x1234);
    cpu.run().unwrap();
    if cpu.regs.de() == 0x1234 && cpu.regs.sp.get() == 0x0100 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ (DE={:04X})", cpu.regs.de());
        failed += 1;
    }

    // Test 7: RST 1 vectors to address 8
    print!("Restart vectoring... ");
    let mut cpu = Cpu::new();
    cpu.load_program(0, &[0xCF]).unwrap();
    cpu.load_program(8, &[0x76]).unwrap();
    cpu.regs.sp.set(0x0100);
    cpu.run().unwrap();
    if cpu.is_halted() && cpu.regs.pc.get() == 9 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ (PC={:04X})", cpu.regs.pc.get());
        failed += 1;
    }

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
