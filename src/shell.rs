//! Line-oriented operator shell.
//!
//! Reads one command per line and prints results or a single `X <reason>`
//! diagnostic. Nothing a command does can stop the shell; only end of input does.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use crate::core::facade::ProtocolFacade;
use crate::core::types::{ClientHandle, Payload};
use crate::utils::tokenize;

/// Commands in the order `help` lists them
pub const COMMANDS: [&str; 4] = ["help", "list_clients", "send", "sendb"];

pub struct Shell {
    facade: Arc<ProtocolFacade>,
}

impl Shell {
    pub fn new(facade: Arc<ProtocolFacade>) -> Self {
        Self { facade }
    }

    /// Runs commands until `input` is exhausted
    pub fn run<R: BufRead, W: Write>(&self, input: R, mut out: W) -> io::Result<()> {
        for line in input.lines() {
            self.execute(&line?, &mut out)?;
            out.flush()?;
        }
        Ok(())
    }

    /// Executes one operator line
    pub fn execute<W: Write>(&self, line: &str, out: &mut W) -> io::Result<()> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Ok(());
        }
        let tokens = tokenize(line);
        let (command, args) = (tokens[0], &tokens[1..]);

        match command {
            "help" => self.help(out),
            "list_clients" => self.list_clients(args, out),
            "send" => self.send(args, out),
            "sendb" => self.sendb(args, out),
            _ => {
                writeln!(out, "unknown command {}", command)?;
                self.help(out)
            }
        }
    }

    fn help<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Server listening on multiple protocol, printing messages as they come")?;
        writeln!(out, "and allowing to interract with clients with interactive commands.")?;
        writeln!(out)?;
        writeln!(out, "Handled protocols:")?;
        for protocol in self.facade.protocols() {
            writeln!(out, "\t{}", protocol.name())?;
        }
        writeln!(out)?;
        writeln!(out, "Commands list:")?;
        for command in COMMANDS {
            writeln!(out, "\t{}", command)?;
        }
        Ok(())
    }

    fn list_clients<W: Write>(&self, args: &[&str], out: &mut W) -> io::Result<()> {
        if args.first() == Some(&"help") {
            writeln!(out, "list_clients")?;
            return writeln!(out, "\tLists clients for each protocol");
        }

        for protocol in self.facade.protocols() {
            writeln!(out, "{}:", protocol.name())?;
            let descriptions = self.facade.list(protocol.name()).unwrap_or_default();
            if descriptions.is_empty() {
                writeln!(out, "\tNo client")?;
            }
            for (handle, description) in descriptions.iter().enumerate() {
                writeln!(out, "\t#{}: {}", handle, description)?;
            }
        }
        Ok(())
    }

    fn send<W: Write>(&self, args: &[&str], out: &mut W) -> io::Result<()> {
        if args.len() < 2 || args[0] == "help" {
            writeln!(out, "send <protocol> <client-num> <message>")?;
            writeln!(out, "\t<protocol> one of the handled protocols")?;
            writeln!(out, "\t<client-num> index of the client in protocol's clients list")?;
            return writeln!(out, "\t<message> anything to send to the client (may contain spaces)");
        }
        self.deliver(args, out, |words| Ok(Payload::line(&words.join(" "))))
    }

    fn sendb<W: Write>(&self, args: &[&str], out: &mut W) -> io::Result<()> {
        if args.len() < 2 || args[0] == "help" {
            writeln!(out, "sendb <protocol> <client-num> <message>")?;
            writeln!(out, "\t<protocol> one of the handled protocols")?;
            writeln!(out, "\t<client-num> index of the client in protocol's clients list")?;
            return writeln!(
                out,
                "\t<message> hexadecimal representation of data to send to the client (spaces are ignored)"
            );
        }
        self.deliver(args, out, |words| Payload::from_hex(&words.join(" ")))
    }

    // Shared tail of send/sendb: check protocol, parse the client number, build and send.
    fn deliver<W, F>(&self, args: &[&str], out: &mut W, build: F) -> io::Result<()>
    where
        W: Write,
        F: FnOnce(&[&str]) -> crate::core::error::ProbeResult<Payload>,
    {
        let protocol = args[0];
        if !self.facade.handles(protocol) {
            return writeln!(out, "X unknown protocol {}", protocol);
        }
        let Ok(handle) = args[1].parse::<ClientHandle>() else {
            return writeln!(out, "X invalid client number {}", args[1]);
        };
        let result = build(&args[2..]).and_then(|payload| self.facade.send(protocol, handle, &payload));
        if let Err(e) = result {
            writeln!(out, "X {}", e)?;
        }
        Ok(())
    }
}
