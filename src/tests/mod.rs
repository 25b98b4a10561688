mod ssh_tools_test;
